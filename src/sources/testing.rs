//! In-memory fakes for the external collaborators.

use crate::error::{EmitError, SourceError};
use crate::models::{Decision, FixedPoint};
use crate::sources::{DecisionSink, GenerationRequest, PriceSource, ReasoningModel};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Price source answering from a fixed table. Unknown feeds are unavailable.
#[derive(Default)]
pub struct FakePriceSource {
    prices: HashMap<String, Result<FixedPoint, SourceError>>,
    reads: Mutex<Vec<String>>,
}

impl FakePriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, feed: &str, raw: i64) -> Self {
        self.prices
            .insert(feed.to_string(), Ok(FixedPoint::from_raw(raw)));
        self
    }

    pub fn with_failure(mut self, feed: &str) -> Self {
        self.prices.insert(
            feed.to_string(),
            Err(SourceError::unavailable(feed, "execution reverted")),
        );
        self
    }

    /// Feeds read so far, in order.
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceSource for FakePriceSource {
    async fn read_latest_price(&self, feed: &str) -> Result<FixedPoint, SourceError> {
        self.reads.lock().unwrap().push(feed.to_string());
        self.prices
            .get(feed)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::unavailable(feed, "no such feed")))
    }
}

/// Reasoning model with one scripted reply for grounded requests and one
/// for ungrounded (API proxy) requests.
pub struct FakeReasoner {
    grounded: Result<String, SourceError>,
    ungrounded: Result<String, SourceError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeReasoner {
    pub fn new(grounded: &str, ungrounded: &str) -> Self {
        Self {
            grounded: Ok(grounded.to_string()),
            ungrounded: Ok(ungrounded.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Both kinds of request fail with `SourceUnavailable`.
    pub fn unavailable() -> Self {
        Self {
            grounded: Err(SourceError::unavailable("reasoner", "connection refused")),
            ungrounded: Err(SourceError::unavailable("reasoner", "connection refused")),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_ungrounded_failure(mut self) -> Self {
        self.ungrounded = Err(SourceError::unavailable("reasoner", "HTTP 503"));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningModel for FakeReasoner {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if request.grounding {
            self.grounded.clone()
        } else {
            self.ungrounded.clone()
        }
    }
}

/// Sink that keeps every emitted decision.
#[derive(Default)]
pub struct RecordingSink {
    decisions: Mutex<Vec<Decision>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            decisions: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.decisions.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionSink for RecordingSink {
    async fn emit(&self, decision: &Decision) -> Result<(), EmitError> {
        if self.fail {
            return Err(EmitError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "ledger offline",
            )));
        }
        self.decisions.lock().unwrap().push(decision.clone());
        Ok(())
    }
}

/// A well-formed reasoning reply.
pub fn reply(outcome: u8, confidence: i64) -> String {
    format!(
        r#"{{"outcome": {}, "confidence": {}, "evidence": "scripted"}}"#,
        outcome, confidence
    )
}
