//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.oracle-resolver.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::sources::FeedTable;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".oracle-resolver.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Reasoning model settings.
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Price feed settings.
    #[serde(default)]
    pub price: PriceConfig,

    /// Composite pipeline defaults.
    #[serde(default)]
    pub composite: CompositeConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Ledger file that receives decisions. Decisions go to stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Number of claims resolved concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for resolving one claim, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: None,
            concurrency: default_concurrency(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout() -> u64 {
    120
}

/// Reasoning model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP timeout for one generation call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            model: default_model(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

/// Price feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// EVM JSON-RPC endpoint used to read feeds.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Feed read when a claim's configured feed fails.
    #[serde(default = "default_feed")]
    pub default_feed: String,

    /// HTTP timeout for one feed read, in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub request_timeout_seconds: u64,

    /// Named feeds (name -> aggregator address).
    #[serde(default = "default_feeds")]
    pub feeds: BTreeMap<String, String>,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            default_feed: default_feed(),
            request_timeout_seconds: default_rpc_timeout(),
            feeds: default_feeds(),
        }
    }
}

impl PriceConfig {
    /// Build the lookup table handed to price adapters.
    pub fn feed_table(&self) -> FeedTable {
        let feeds: HashMap<String, String> = self
            .feeds
            .iter()
            .map(|(name, address)| (name.clone(), address.clone()))
            .collect();
        FeedTable::new(feeds, self.default_feed.clone())
    }
}

fn default_rpc_url() -> String {
    "https://sepolia.base.org".to_string()
}

fn default_feed() -> String {
    "ETH/USD".to_string()
}

fn default_rpc_timeout() -> u64 {
    15
}

/// Price aggregators on Base Sepolia.
fn default_feeds() -> BTreeMap<String, String> {
    [
        ("ETH/USD", "0x4aDC67d868764F27A76A1C73B3552fa4F21E470b"),
        ("BTC/USD", "0x0FB99723Aee6f420beAD13e6bBB79024e1BA0013"),
        ("LINK/USD", "0xb113F5A928BCfF189C998ab20d753a47F9dE5A61"),
    ]
    .into_iter()
    .map(|(name, address)| (name.to_string(), address.to_string()))
    .collect()
}

/// Composite pipeline defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// Agreement threshold for requests that do not set one.
    #[serde(default = "default_required_agreement")]
    pub required_agreement: u32,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            required_agreement: default_required_agreement(),
        }
    }
}

fn default_required_agreement() -> u32 {
    2
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.ollama_url {
            self.reasoning.ollama_url = url.clone();
        }
        if let Some(ref model) = args.model {
            self.reasoning.model = model.clone();
        }
        if let Some(ref rpc_url) = args.rpc_url {
            self.price.rpc_url = rpc_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.general.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.reasoning.model, "llama3.2:latest");
        assert_eq!(config.general.concurrency, 4);
        assert_eq!(config.composite.required_agreement, 2);
        assert_eq!(config.price.default_feed, "ETH/USD");
        assert!(config.price.feeds.contains_key("BTC/USD"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "decisions.jsonl"
timeout_seconds = 30

[reasoning]
model = "qwen2.5:14b"

[price]
default_feed = "BTC/USD"

[price.feeds]
"BTC/USD" = "0xbtc"

[composite]
required_agreement = 3
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output.as_deref(), Some("decisions.jsonl"));
        assert_eq!(config.general.timeout_seconds, 30);
        assert_eq!(config.general.concurrency, 4);
        assert_eq!(config.reasoning.model, "qwen2.5:14b");
        assert_eq!(config.reasoning.ollama_url, "http://localhost:11434");
        assert_eq!(config.composite.required_agreement, 3);

        let table = config.price.feed_table();
        assert_eq!(table.default_address(), "0xbtc");
        assert_eq!(table.resolve("ETH/USD"), "ETH/USD");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[reasoning]"));
        assert!(toml_str.contains("[price]"));
        assert!(toml_str.contains("[composite]"));

        let round_tripped: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(round_tripped.price.feeds.len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[general]\nconcurrency = 8\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.general.concurrency, 8);
        assert!(Config::load(&temp_dir.path().join("missing.toml")).is_err());
    }
}
