//! Resolution request files.
//!
//! A request file lists one or more claims to resolve, in TOML or JSON:
//!
//! ```toml
//! [[claims]]
//! claim_id = 1
//! pipeline_type = 0
//! question = "Will ETH close above $5000?"
//! price_source = "ETH/USD"
//! threshold = 500000000000
//! direction = "above"
//! ```

use crate::models::{FixedPoint, PipelineConfig, ResolveRequest, ThresholdDirection};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One claim entry as written in a request file. Omitted settings take the
/// configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEntry {
    pub claim_id: u64,
    pub pipeline_type: u8,
    pub question: String,
    #[serde(default)]
    pub price_source: Option<String>,
    #[serde(default)]
    pub threshold: Option<FixedPoint>,
    #[serde(default)]
    pub direction: Option<ThresholdDirection>,
    #[serde(default)]
    pub required_agreement: Option<u32>,
    #[serde(default)]
    pub prompt_hash: Option<String>,
}

impl RequestEntry {
    /// Build the inbound trigger, filling the agreement threshold from
    /// `default_agreement` when the entry leaves it out.
    pub fn into_request(self, default_agreement: u32) -> Result<ResolveRequest> {
        let prompt_hash = match self.prompt_hash.as_deref() {
            Some(text) => Some(parse_digest(text).with_context(|| {
                format!("Invalid prompt_hash for claim {}", self.claim_id)
            })?),
            None => None,
        };

        let required_agreement = self.required_agreement.unwrap_or(default_agreement);
        if required_agreement == 0 {
            bail!("required_agreement for claim {} must be at least 1", self.claim_id);
        }

        Ok(ResolveRequest {
            claim_id: self.claim_id,
            pipeline_type: self.pipeline_type,
            question: self.question,
            config: PipelineConfig {
                price_source: self.price_source,
                threshold: self.threshold.unwrap_or_default(),
                direction: self.direction.unwrap_or_default(),
                required_agreement,
                prompt_hash,
            },
        })
    }
}

/// Parse a 32-byte hex digest, with or without `0x`.
pub fn parse_digest(text: &str) -> Result<[u8; 32]> {
    let mut digest = [0u8; 32];
    hex::decode_to_slice(text.trim().trim_start_matches("0x"), &mut digest)
        .context("expected 32 hex-encoded bytes")?;
    Ok(digest)
}

/// Contents of a request file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFile {
    #[serde(default)]
    pub claims: Vec<RequestEntry>,
}

impl RequestFile {
    /// Load a request file. `.json` files are JSON, everything else TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?;

        let file: RequestFile = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse request file: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse request file: {}", path.display()))?
        };

        if file.claims.is_empty() {
            bail!("Request file {} contains no claims", path.display());
        }

        Ok(file)
    }

    /// Convert every entry into a resolution trigger.
    pub fn into_requests(self, default_agreement: u32) -> Result<Vec<ResolveRequest>> {
        self.claims
            .into_iter()
            .map(|entry| entry.into_request(default_agreement))
            .collect()
    }
}
