//! oracle-resolver - resolution engine for prediction market claims
//!
//! Resolves claims to YES/NO/INVALID with a confidence by running the
//! pipeline each claim names: price thresholds read from on-chain feeds,
//! reasoning models, or a composite vote across several sources. Every
//! decision is emitted exactly once to stdout or a ledger file.
//!
//! Exit codes:
//!   0 - Every claim resolved (or was already settled)
//!   1 - Runtime error (bad config, unreadable request file, etc.)
//!   2 - At least one claim failed to resolve

mod adapters;
mod cli;
mod composite;
mod config;
mod dispatcher;
mod error;
mod models;
mod registry;
mod report;
mod request;
mod sources;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use dispatcher::Dispatcher;
use indicatif::{ProgressBar, ProgressStyle};
use models::{Claim, ResolveRequest};
use registry::StrategyRegistry;
use report::{BatchReport, ReportMetadata};
use request::RequestFile;
use sources::{DecisionSink, EvmRpcPriceSource, LedgerFileSink, OllamaReasoner, OllamaSettings, StdoutSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("oracle-resolver v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Resolution run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default config file.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize endpoints, feeds, and agreement thresholds.");
    Ok(())
}

/// Initialize logging based on verbosity settings. Logs go to stderr so
/// stdout stays free for emitted decisions.
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

/// Run one batch of resolutions. Returns the exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let requests = load_requests(&args, &config)?;
    info!("Loaded {} claim(s)", requests.len());

    let feeds = Arc::new(config.price.feed_table());
    let prices = Arc::new(EvmRpcPriceSource::new(
        config.price.rpc_url.clone(),
        Duration::from_secs(config.price.request_timeout_seconds),
    )?);
    let reasoner = Arc::new(OllamaReasoner::new(OllamaSettings {
        ollama_url: config.reasoning.ollama_url.clone(),
        model_name: config.reasoning.model.clone(),
        timeout_seconds: config.reasoning.request_timeout_seconds,
    })?);

    let registry = StrategyRegistry::standard(prices, reasoner, feeds);
    debug!("Registered {} pipeline strategies", registry.len());

    if args.dry_run {
        return handle_dry_run(&registry, requests);
    }

    let (sink, sink_name): (Arc<dyn DecisionSink>, String) = match config.general.output {
        Some(ref path) => (
            Arc::new(LedgerFileSink::new(path.as_str())) as Arc<dyn DecisionSink>,
            path.clone(),
        ),
        None => (Arc::new(StdoutSink::stdout()) as Arc<dyn DecisionSink>, "stdout".to_string()),
    };

    let dispatcher = Dispatcher::new(registry, sink)
        .with_timeout(Duration::from_secs(config.general.timeout_seconds));

    let claims: Vec<Claim> = requests
        .iter()
        .cloned()
        .map(ResolveRequest::into_claim)
        .collect();

    let spinner = resolution_spinner(&args, claims.len());
    let mut results = match <[ResolveRequest; 1]>::try_from(requests) {
        Ok([request]) => {
            let claim_id = request.claim_id;
            vec![(claim_id, dispatcher.dispatch_request(request).await)]
        }
        Err(_) => {
            dispatcher
                .dispatch_all(&claims, config.general.concurrency)
                .await
        }
    };

    if args.retry_failed {
        dispatcher.retry_failed(&claims, &mut results).await;
    }
    spinner.finish_and_clear();

    let report = BatchReport::from_results(
        ReportMetadata {
            generated_at: Utc::now(),
            model_used: config.reasoning.model.clone(),
            rpc_url: config.price.rpc_url.clone(),
            sink: sink_name,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        results,
    );

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Text => report::generate_text_report(&report),
    };

    // Decisions own stdout when no ledger file is configured.
    if !args.quiet || args.format == OutputFormat::Json {
        if config.general.output.is_some() {
            println!("{}", rendered);
        } else {
            eprintln!("{}", rendered);
        }
    }

    if report.has_failures() {
        eprintln!(
            "⛔ {} claim(s) failed to resolve (exit code 2).",
            report.summary.failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: show the strategy each claim would run, exit.
fn handle_dry_run(registry: &StrategyRegistry, requests: Vec<ResolveRequest>) -> Result<i32> {
    println!("\n🔍 Dry run: selecting pipelines (no source calls)...\n");

    for claim in requests.into_iter().map(ResolveRequest::into_claim) {
        let fallback = registry.get(claim.pipeline_type).is_err();
        let strategy = registry.select(claim.pipeline_type);
        println!(
            "   #{} [{}] -> {}{}",
            claim.id,
            claim.pipeline_type,
            strategy.label(),
            if fallback { " (fallback)" } else { "" }
        );
        println!("      {}", claim.question);
    }

    println!("\n✅ Dry run complete. No sources were called.");
    Ok(0)
}

/// Spinner shown while claims resolve; hidden in quiet mode.
fn resolution_spinner(args: &Args, claims: usize) -> ProgressBar {
    if args.quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    match ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        Ok(style) => spinner.set_style(style),
        Err(e) => debug!("Falling back to default spinner style: {}", e),
    }
    spinner.set_message(format!("Resolving {} claim(s)...", claims));
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Build resolution requests from --request or the single-claim flags.
fn load_requests(args: &Args, config: &Config) -> Result<Vec<ResolveRequest>> {
    let default_agreement = config.composite.required_agreement;

    if let Some(ref path) = args.request {
        info!("Loading requests from: {}", path.display());
        return RequestFile::load(path)?.into_requests(default_agreement);
    }

    match args.single_claim() {
        Some(entry) => Ok(vec![entry.into_request(default_agreement)?]),
        None => bail!("No claims to resolve: pass --request or --claim-id"),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
