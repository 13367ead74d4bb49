//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

use crate::models::{FixedPoint, ThresholdDirection};
use crate::request::RequestEntry;

/// oracle-resolver - resolve prediction market claims through oracle pipelines
///
/// Resolves YES/NO/INVALID claims using price feeds, reasoning models, or a
/// composite of several sources, and emits ledger-ready decisions.
///
/// Examples:
///   oracle-resolver --request claims.toml
///   oracle-resolver --claim-id 1 --pipeline-type 0 --question "ETH > $5000?" \
///       --price-source ETH/USD --threshold 5000 --direction above
///   oracle-resolver --claim-id 2 --pipeline-type 4 --question "Did it happen?"
///   oracle-resolver --request claims.toml --dry-run
///   oracle-resolver --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Request file listing claims to resolve (TOML, or JSON by extension)
    #[arg(short, long, value_name = "FILE", conflicts_with = "claim_id")]
    pub request: Option<PathBuf>,

    /// Id of a single claim to resolve
    #[arg(long, value_name = "ID", requires_all = ["question", "pipeline_type"])]
    pub claim_id: Option<u64>,

    /// Question text of the single claim
    #[arg(long, value_name = "TEXT")]
    pub question: Option<String>,

    /// Pipeline type code of the single claim
    ///
    /// 0 = price feed, 1 = data stream, 2 = API proxy, 3 = grounded AI,
    /// 4 = composite. Unknown codes fall back to grounded AI.
    #[arg(long, value_name = "CODE")]
    pub pipeline_type: Option<u8>,

    /// Price feed name or address for threshold and composite pipelines
    #[arg(long, value_name = "FEED")]
    pub price_source: Option<String>,

    /// Price threshold in whole units, e.g. 5000 or 5000.25
    #[arg(long, value_name = "PRICE", allow_hyphen_values = true)]
    pub threshold: Option<FixedPoint>,

    /// Direction of the threshold comparison
    #[arg(long, value_name = "DIR")]
    pub direction: Option<ThresholdDirection>,

    /// Same-outcome opinions needed for a composite outcome
    #[arg(long, value_name = "N")]
    pub required_agreement: Option<u32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .oracle-resolver.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Ollama model used by the reasoning pipelines
    #[arg(short, long, env = "ORACLE_RESOLVER_MODEL")]
    pub model: Option<String>,

    /// EVM JSON-RPC endpoint for price feeds
    #[arg(long, env = "ORACLE_RESOLVER_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Per-claim resolution timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of claims resolved concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Ledger file that receives decisions as JSON lines (stdout if unset)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Summary format printed after resolution
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Re-submit claims that failed once more before reporting
    #[arg(long)]
    pub retry_failed: bool,

    /// Show which pipeline each claim would use without calling any source
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .oracle-resolver.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.request.is_none() && self.claim_id.is_none() {
            return Err("Either --request or --claim-id must be given".to_string());
        }

        for url in [&self.ollama_url, &self.rpc_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with 'http://' or 'https://': {}", url));
            }
        }

        if self.required_agreement == Some(0) {
            return Err("Required agreement must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref request) = self.request {
            if !request.is_file() {
                return Err(format!("Request file does not exist: {}", request.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The single claim described by flags, if any.
    pub fn single_claim(&self) -> Option<RequestEntry> {
        Some(RequestEntry {
            claim_id: self.claim_id?,
            pipeline_type: self.pipeline_type?,
            question: self.question.clone()?,
            price_source: self.price_source.clone(),
            threshold: self.threshold,
            direction: self.direction,
            required_agreement: self.required_agreement,
            prompt_hash: None,
        })
    }
}
