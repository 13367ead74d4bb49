//! Composite resolution.
//!
//! Fans a claim out to the price feed (when configured) and two reasoning
//! sources concurrently, then applies the agreement rule in [`aggregator`].

pub mod aggregator;

use crate::adapters::SourceAdapter;
use crate::error::SourceError;
use crate::models::{Claim, Opinion};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use aggregator::{aggregate, COMPOSITE_LABEL};

/// Runs independent sources side by side and combines their opinions.
pub struct CompositeAggregator {
    price: Arc<dyn SourceAdapter>,
    grounded: Arc<dyn SourceAdapter>,
    api_proxy: Arc<dyn SourceAdapter>,
}

impl CompositeAggregator {
    pub fn new(
        price: Arc<dyn SourceAdapter>,
        grounded: Arc<dyn SourceAdapter>,
        api_proxy: Arc<dyn SourceAdapter>,
    ) -> Self {
        Self {
            price,
            grounded,
            api_proxy,
        }
    }

    /// Price opinion if a source is configured. Failures are swallowed so the
    /// composite degrades to the reasoning sources.
    async fn optional_price_opinion(&self, claim: &Claim) -> Option<Opinion> {
        claim.config.price_source()?;

        match self.price.resolve(claim).await {
            Ok(opinion) => Some(opinion),
            Err(e) => {
                warn!(
                    "{} source failed for claim {}, skipping: {}",
                    self.price.label(),
                    claim.id,
                    e
                );
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for CompositeAggregator {
    fn label(&self) -> &str {
        COMPOSITE_LABEL
    }

    async fn resolve(&self, claim: &Claim) -> Result<Opinion, SourceError> {
        let price = async { Ok::<_, SourceError>(self.optional_price_opinion(claim).await) };

        // Reasoning failures are fatal; try_join drops whatever is still in flight.
        let (price, grounded, api_proxy) = futures::try_join!(
            price,
            self.grounded.resolve(claim),
            self.api_proxy.resolve(claim)
        )?;

        let mut opinions = Vec::with_capacity(3);
        opinions.extend(price);
        opinions.push(grounded);
        opinions.push(api_proxy);

        debug!(
            "Claim {}: {} composite opinions collected",
            claim.id,
            opinions.len()
        );

        let result = aggregate(&opinions, claim.config.required_agreement());
        info!(
            "Composite for claim {}: {} ({}) with agreement threshold {}",
            claim.id,
            result.outcome,
            result.confidence,
            claim.config.required_agreement()
        );

        Ok(result)
    }
}
