//! Reasoning-model adapters.
//!
//! Both adapters send the claim question to a [`ReasoningModel`] with a
//! context-specific system prompt and read the reply with
//! [`parse_opinion`]. Transport failures propagate; unreadable replies
//! degrade to an `Invalid` opinion.

use crate::adapters::parse::{parse_opinion, ParsedOpinion};
use crate::adapters::SourceAdapter;
use crate::error::SourceError;
use crate::models::{Claim, Opinion};
use crate::sources::{GenerationRequest, ReasoningModel};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub const GROUNDED_LABEL: &str = "Grounded AI";
pub const API_PROXY_LABEL: &str = "API Proxy";

const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 400;

/// The role the model is asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningContext {
    /// Fact-check the claim against live search results.
    Grounded,
    /// Act as a proxy for an external data API.
    ApiProxy,
    /// One independent voice among several composite sources.
    CompositeParticipant,
}

impl ReasoningContext {
    fn system_prompt(&self) -> &'static str {
        match self {
            ReasoningContext::Grounded => GROUNDED_SYSTEM_PROMPT,
            ReasoningContext::ApiProxy => API_PROXY_SYSTEM_PROMPT,
            ReasoningContext::CompositeParticipant => COMPOSITE_SYSTEM_PROMPT,
        }
    }

    fn grounding(&self) -> bool {
        !matches!(self, ReasoningContext::ApiProxy)
    }
}

/// Build the generation request for a claim.
pub fn build_request(context: ReasoningContext, question: &str) -> GenerationRequest {
    GenerationRequest {
        system: context.system_prompt().to_string(),
        prompt: format!(
            "Question: \"{}\"\n\n{}",
            question.replace('"', "'"),
            RESOLUTION_INSTRUCTIONS
        ),
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        grounding: context.grounding(),
    }
}

struct ReasoningAdapter {
    model: Arc<dyn ReasoningModel>,
    context: ReasoningContext,
    label: &'static str,
}

impl ReasoningAdapter {
    async fn resolve(&self, claim: &Claim) -> Result<Opinion, SourceError> {
        if let Some(hash) = claim.config.prompt_hash {
            debug!("Claim {} prompt hash 0x{}", claim.id, hex::encode(hash));
        }

        let request = build_request(self.context, &claim.question);
        let reply = self.model.generate(&request).await?;

        let parsed = parse_opinion(&reply, self.label);
        if let ParsedOpinion::Degraded { reason, .. } = &parsed {
            warn!(
                "{} reply for claim {} unreadable ({}); degrading to INVALID",
                self.label, claim.id, reason
            );
        }
        Ok(parsed.into_opinion())
    }
}

/// Web-grounded fact checking.
pub struct GroundedReasoningAdapter {
    inner: ReasoningAdapter,
}

impl GroundedReasoningAdapter {
    pub fn new(model: Arc<dyn ReasoningModel>) -> Self {
        Self::with_context(model, ReasoningContext::Grounded)
    }

    /// Grounded reasoning phrased as one of several composite sources.
    pub fn composite_participant(model: Arc<dyn ReasoningModel>) -> Self {
        Self::with_context(model, ReasoningContext::CompositeParticipant)
    }

    fn with_context(model: Arc<dyn ReasoningModel>, context: ReasoningContext) -> Self {
        Self {
            inner: ReasoningAdapter {
                model,
                context,
                label: GROUNDED_LABEL,
            },
        }
    }
}

#[async_trait]
impl SourceAdapter for GroundedReasoningAdapter {
    fn label(&self) -> &str {
        self.inner.label
    }

    async fn resolve(&self, claim: &Claim) -> Result<Opinion, SourceError> {
        self.inner.resolve(claim).await
    }
}

/// Reasoning that simulates an external API lookup.
pub struct ExternalApiProxyAdapter {
    inner: ReasoningAdapter,
}

impl ExternalApiProxyAdapter {
    pub fn new(model: Arc<dyn ReasoningModel>) -> Self {
        Self {
            inner: ReasoningAdapter {
                model,
                context: ReasoningContext::ApiProxy,
                label: API_PROXY_LABEL,
            },
        }
    }
}

#[async_trait]
impl SourceAdapter for ExternalApiProxyAdapter {
    fn label(&self) -> &str {
        self.inner.label
    }

    async fn resolve(&self, claim: &Claim) -> Result<Opinion, SourceError> {
        self.inner.resolve(claim).await
    }
}

const GROUNDED_SYSTEM_PROMPT: &str = "You are a resolution oracle for prediction markets. \
Use web search grounding to fact-check the claim and give a thoroughly researched answer.";

const API_PROXY_SYSTEM_PROMPT: &str = "You are acting as an external data API for a \
prediction market oracle. Simulate the API call that would resolve the question. \
Be precise and data-driven.";

const COMPOSITE_SYSTEM_PROMPT: &str = "You are one of several independent sources in a \
composite prediction market oracle. Give your own assessment; price feeds and other \
models will weigh in separately.";

const RESOLUTION_INSTRUCTIONS: &str = r#"Determine the outcome of this prediction market question.

Rules:
- outcome: 0 = YES, 1 = NO, 2 = INVALID (only if truly unresolvable)
- confidence: 0-10000 in basis points (8500 = 85%)
- Only return confidence above 6000 with strong evidence
- Cite specific evidence for the determination

Respond ONLY with JSON:
{"outcome": 0, "confidence": 8500, "evidence": "Brief factual evidence supporting this outcome"}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, PipelineConfig, PipelineType};
    use crate::sources::testing::{reply, FakeReasoner};

    fn claim() -> Claim {
        Claim {
            id: 3,
            question: "Did the \"Artemis II\" mission launch in 2025?".to_string(),
            pipeline_type: PipelineType::GroundedReasoning,
            config: PipelineConfig::default(),
        }
    }

    #[test]
    fn test_request_parameters_are_fixed() {
        let request = build_request(ReasoningContext::ApiProxy, "Q?");
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 400);
        assert!(!request.grounding);
        assert!(request.prompt.contains("Question: \"Q?\""));
        assert!(request.prompt.contains("Respond ONLY with JSON"));

        assert!(build_request(ReasoningContext::Grounded, "Q?").grounding);
        assert!(build_request(ReasoningContext::CompositeParticipant, "Q?").grounding);
    }

    #[test]
    fn test_question_quotes_are_neutralised() {
        let request = build_request(ReasoningContext::Grounded, "the \"big\" one");
        assert!(request.prompt.contains("Question: \"the 'big' one\""));
    }

    #[tokio::test]
    async fn test_grounded_adapter_parses_reply() {
        let model = Arc::new(FakeReasoner::new(&reply(0, 8800), &reply(1, 1)));
        let adapter = GroundedReasoningAdapter::new(model.clone());

        let opinion = adapter.resolve(&claim()).await.unwrap();

        assert_eq!(opinion.outcome, Outcome::Yes);
        assert_eq!(opinion.confidence.bps(), 8800);
        assert_eq!(opinion.source_label, GROUNDED_LABEL);

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, GROUNDED_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_api_proxy_adapter_uses_proxy_context() {
        let model = Arc::new(FakeReasoner::new(&reply(0, 1), &reply(1, 6400)));
        let adapter = ExternalApiProxyAdapter::new(model.clone());

        let opinion = adapter.resolve(&claim()).await.unwrap();

        assert_eq!(opinion.outcome, Outcome::No);
        assert_eq!(opinion.confidence.bps(), 6400);
        assert_eq!(model.requests()[0].system, API_PROXY_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_unreadable_reply_degrades_instead_of_failing() {
        let model = Arc::new(FakeReasoner::new("Sorry, I cannot help with that.", "{}"));
        let adapter = GroundedReasoningAdapter::new(model);

        let opinion = adapter.resolve(&claim()).await.unwrap();

        assert_eq!(opinion.outcome, Outcome::Invalid);
        assert_eq!(opinion.confidence.bps(), 3000);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let adapter = ExternalApiProxyAdapter::new(Arc::new(FakeReasoner::unavailable()));
        let err = adapter.resolve(&claim()).await.unwrap_err();
        assert!(matches!(err, SourceError::SourceUnavailable { .. }));
    }
}
