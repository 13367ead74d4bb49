//! Source adapters.
//!
//! Each adapter turns a claim into one independent [`Opinion`] by consulting
//! a single kind of source.

pub mod parse;
pub mod reasoning;
pub mod threshold;

use crate::error::SourceError;
use crate::models::{Claim, Opinion};
use async_trait::async_trait;

pub use reasoning::{ExternalApiProxyAdapter, GroundedReasoningAdapter};
pub use threshold::{PriceThresholdAdapter, StreamingThresholdAdapter};

/// A single source of opinions about claims.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Label used in evidence summaries.
    fn label(&self) -> &str;

    /// Form an opinion about `claim`, reading whatever config fields this
    /// source needs.
    async fn resolve(&self, claim: &Claim) -> Result<Opinion, SourceError>;
}
