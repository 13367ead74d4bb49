//! Pipeline strategy registry.
//!
//! Maps each pipeline type to the strategy that resolves it. Adding a new
//! pipeline is one [`StrategyRegistry::register`] call.

use crate::adapters::{
    ExternalApiProxyAdapter, GroundedReasoningAdapter, PriceThresholdAdapter, SourceAdapter,
    StreamingThresholdAdapter,
};
use crate::composite::CompositeAggregator;
use crate::error::UnknownPipelineType;
use crate::models::PipelineType;
use crate::sources::{FeedTable, PriceSource, ReasoningModel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Strategy table with a default-safe fallback.
pub struct StrategyRegistry {
    strategies: HashMap<PipelineType, Arc<dyn SourceAdapter>>,
    fallback: Arc<dyn SourceAdapter>,
}

impl StrategyRegistry {
    /// Empty registry; unmapped types resolve with `fallback`.
    pub fn new(fallback: Arc<dyn SourceAdapter>) -> Self {
        Self {
            strategies: HashMap::new(),
            fallback,
        }
    }

    /// Registry with all five standard pipelines wired to the given sources.
    pub fn standard(
        prices: Arc<dyn PriceSource>,
        reasoner: Arc<dyn ReasoningModel>,
        feeds: Arc<FeedTable>,
    ) -> Self {
        let price_feed: Arc<dyn SourceAdapter> =
            Arc::new(PriceThresholdAdapter::new(prices.clone(), feeds.clone()));
        let grounded: Arc<dyn SourceAdapter> =
            Arc::new(GroundedReasoningAdapter::new(reasoner.clone()));
        let api_proxy: Arc<dyn SourceAdapter> =
            Arc::new(ExternalApiProxyAdapter::new(reasoner.clone()));
        let composite = CompositeAggregator::new(
            price_feed.clone(),
            Arc::new(GroundedReasoningAdapter::composite_participant(reasoner)),
            api_proxy.clone(),
        );

        let mut registry = Self::new(grounded.clone());
        registry.register(PipelineType::PriceThreshold, price_feed);
        registry.register(
            PipelineType::StreamingThreshold,
            Arc::new(StreamingThresholdAdapter::new(prices, feeds)),
        );
        registry.register(PipelineType::ExternalApiProxy, api_proxy);
        registry.register(PipelineType::GroundedReasoning, grounded);
        registry.register(PipelineType::Composite, Arc::new(composite));
        registry
    }

    /// Register (or replace) the strategy for a pipeline type.
    pub fn register(
        &mut self,
        pipeline: PipelineType,
        strategy: Arc<dyn SourceAdapter>,
    ) -> Option<Arc<dyn SourceAdapter>> {
        self.strategies.insert(pipeline, strategy)
    }

    /// Strict lookup.
    pub fn get(&self, pipeline: PipelineType) -> Result<&Arc<dyn SourceAdapter>, UnknownPipelineType> {
        self.strategies
            .get(&pipeline)
            .ok_or(UnknownPipelineType(pipeline.code()))
    }

    /// Lookup that falls back to the default strategy for unmapped types.
    pub fn select(&self, pipeline: PipelineType) -> &Arc<dyn SourceAdapter> {
        match self.get(pipeline) {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(
                    "{}; falling back to {} pipeline",
                    e,
                    self.fallback.label()
                );
                &self.fallback
            }
        }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}
