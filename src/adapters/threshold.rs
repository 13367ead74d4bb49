//! Deterministic price-threshold adapters.

use crate::adapters::SourceAdapter;
use crate::error::SourceError;
use crate::models::{Claim, Confidence, FixedPoint, Opinion, Outcome, PipelineConfig, ThresholdDirection};
use crate::sources::{FeedTable, PriceSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PRICE_FEED_LABEL: &str = "Data Feed";
pub const DATA_STREAM_LABEL: &str = "Data Stream";

/// `Yes` iff the price is strictly past the threshold in `direction`.
pub fn threshold_outcome(price: FixedPoint, threshold: FixedPoint, direction: ThresholdDirection) -> Outcome {
    let holds = match direction {
        ThresholdDirection::Above => price > threshold,
        ThresholdDirection::Below => price < threshold,
    };
    if holds {
        Outcome::Yes
    } else {
        Outcome::No
    }
}

/// Compare a price against the claim's threshold. Always fully confident.
pub fn threshold_opinion(price: FixedPoint, config: &PipelineConfig, source_label: &str) -> Opinion {
    let outcome = threshold_outcome(price, config.threshold, config.direction);
    Opinion::new(
        outcome,
        Confidence::CERTAIN,
        format!(
            "Price Feed: ${} vs threshold ${} ({})",
            price, config.threshold, config.direction
        ),
        source_label,
    )
}

/// Reads a price feed and compares it against the claim threshold.
pub struct PriceThresholdAdapter {
    prices: Arc<dyn PriceSource>,
    feeds: Arc<FeedTable>,
}

impl PriceThresholdAdapter {
    pub fn new(prices: Arc<dyn PriceSource>, feeds: Arc<FeedTable>) -> Self {
        Self { prices, feeds }
    }

    /// Read the configured feed, falling back to the default feed once.
    async fn read_price(&self, claim: &Claim) -> Result<FixedPoint, SourceError> {
        let Some(handle) = claim.config.price_source() else {
            debug!(
                "Claim {} has no price source; reading default feed {}",
                claim.id,
                self.feeds.default_name()
            );
            return self
                .prices
                .read_latest_price(self.feeds.default_address())
                .await;
        };

        match self.prices.read_latest_price(self.feeds.resolve(handle)).await {
            Ok(price) => Ok(price),
            Err(e) => {
                warn!(
                    "Price feed {} failed for claim {} ({}); falling back to default feed {}",
                    handle,
                    claim.id,
                    e,
                    self.feeds.default_name()
                );
                self.prices
                    .read_latest_price(self.feeds.default_address())
                    .await
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for PriceThresholdAdapter {
    fn label(&self) -> &str {
        PRICE_FEED_LABEL
    }

    async fn resolve(&self, claim: &Claim) -> Result<Opinion, SourceError> {
        let price = self.read_price(claim).await?;
        Ok(threshold_opinion(price, &claim.config, PRICE_FEED_LABEL))
    }
}

/// Same decision rule as [`PriceThresholdAdapter`] over a low-latency feed.
pub struct StreamingThresholdAdapter {
    feed: PriceThresholdAdapter,
}

impl StreamingThresholdAdapter {
    pub fn new(prices: Arc<dyn PriceSource>, feeds: Arc<FeedTable>) -> Self {
        Self {
            feed: PriceThresholdAdapter::new(prices, feeds),
        }
    }
}

#[async_trait]
impl SourceAdapter for StreamingThresholdAdapter {
    fn label(&self) -> &str {
        DATA_STREAM_LABEL
    }

    async fn resolve(&self, claim: &Claim) -> Result<Opinion, SourceError> {
        let price = self.feed.read_price(claim).await?;
        let opinion = threshold_opinion(price, &claim.config, DATA_STREAM_LABEL);
        Ok(Opinion {
            evidence: format!("Data Stream (real-time): {}", opinion.evidence),
            ..opinion
        })
    }
}
