//! Resolution dispatcher.
//!
//! Entry point of the core: selects the strategy for a claim, runs it, and
//! hands the resulting decision to the sink exactly once. Tracks the
//! per-claim lifecycle `Requested -> Resolving -> Resolved | Failed` so
//! duplicate deliveries of the same request are no-ops.

use crate::error::DispatchError;
use crate::models::{Claim, Decision, ResolveRequest};
use crate::registry::StrategyRegistry;
use crate::sources::DecisionSink;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a claim that has been requested at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimState {
    Resolving,
    Resolved,
    Failed,
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimState::Resolving => write!(f, "resolving"),
            ClaimState::Resolved => write!(f, "resolved"),
            ClaimState::Failed => write!(f, "failed"),
        }
    }
}

/// Successful result of a dispatch call.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The claim was resolved and its decision emitted by this call.
    Resolved(Decision),
    /// The claim was already in flight or settled; nothing was done.
    AlreadySettled { claim_id: u64, state: ClaimState },
}

type StateTable = Mutex<HashMap<u64, ClaimState>>;

fn lock(states: &StateTable) -> MutexGuard<'_, HashMap<u64, ClaimState>> {
    states.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the claim `Failed` if the cycle ends without an explicit outcome,
/// which happens when the dispatch future is dropped mid-flight.
struct CycleGuard<'a> {
    states: &'a StateTable,
    claim_id: u64,
    settled: bool,
}

impl<'a> CycleGuard<'a> {
    fn finish(mut self, state: ClaimState) {
        lock(self.states).insert(self.claim_id, state);
        self.settled = true;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Resolution of claim {} cancelled; no decision emitted", self.claim_id);
            lock(self.states).insert(self.claim_id, ClaimState::Failed);
        }
    }
}

/// Selects, runs and emits.
pub struct Dispatcher {
    registry: StrategyRegistry,
    sink: Arc<dyn DecisionSink>,
    timeout: Option<Duration>,
    states: StateTable,
}

impl Dispatcher {
    pub fn new(registry: StrategyRegistry, sink: Arc<dyn DecisionSink>) -> Self {
        Self {
            registry,
            sink,
            timeout: None,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Abort any resolution that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Current lifecycle state of a claim, if it was ever requested.
    pub fn state(&self, claim_id: u64) -> Option<ClaimState> {
        lock(&self.states).get(&claim_id).copied()
    }

    /// Handle an inbound resolution trigger.
    pub async fn dispatch_request(&self, request: ResolveRequest) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(&request.into_claim()).await
    }

    /// Resolve a claim and emit its decision.
    ///
    /// A claim that is already resolving, resolved or failed is left alone;
    /// use [`Dispatcher::retry`] to start a fresh cycle for a failed claim.
    pub async fn dispatch(&self, claim: &Claim) -> Result<DispatchOutcome, DispatchError> {
        let Some(guard) = self.begin(claim.id) else {
            let state = self.state(claim.id).unwrap_or(ClaimState::Resolving);
            debug!("Claim {} already {}; ignoring duplicate request", claim.id, state);
            return Ok(DispatchOutcome::AlreadySettled {
                claim_id: claim.id,
                state,
            });
        };

        let strategy = self.registry.select(claim.pipeline_type);
        info!(
            "Executing {} pipeline ({}) for claim {}",
            claim.pipeline_type,
            strategy.label(),
            claim.id
        );

        let run = strategy.resolve(claim);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    error!("Claim {} timed out after {:?}", claim.id, limit);
                    guard.finish(ClaimState::Failed);
                    return Err(DispatchError::TimedOut {
                        claim_id: claim.id,
                        after: limit,
                    });
                }
            },
            None => run.await,
        };

        let opinion = match result {
            Ok(opinion) => opinion,
            Err(cause) => {
                error!("Resolution failed for claim {}: {}", claim.id, cause);
                guard.finish(ClaimState::Failed);
                return Err(DispatchError::ResolutionFailed {
                    claim_id: claim.id,
                    cause,
                });
            }
        };

        let decision = Decision::from_opinion(claim, opinion);
        info!(
            "Claim {} result: {} (confidence: {})",
            claim.id, decision.outcome, decision.confidence
        );
        debug!("Claim {} evidence: {}", claim.id, decision.evidence_summary);

        if let Err(source) = self.sink.emit(&decision).await {
            error!("Failed to emit decision for claim {}: {}", claim.id, source);
            guard.finish(ClaimState::Failed);
            return Err(DispatchError::EmitFailed {
                claim_id: claim.id,
                source,
            });
        }

        guard.finish(ClaimState::Resolved);
        Ok(DispatchOutcome::Resolved(decision))
    }

    /// Start a fresh cycle for a claim whose previous cycle failed.
    /// Resolved and in-flight claims are still left alone.
    pub async fn retry(&self, claim: &Claim) -> Result<DispatchOutcome, DispatchError> {
        {
            let mut states = lock(&self.states);
            if states.get(&claim.id) == Some(&ClaimState::Failed) {
                info!("Re-submitting failed claim {}", claim.id);
                states.remove(&claim.id);
            }
        }
        self.dispatch(claim).await
    }

    /// Give every failed entry of `results` one fresh cycle, replacing its
    /// result in place. Entries whose claim is not in `claims` are left alone.
    pub async fn retry_failed(
        &self,
        claims: &[Claim],
        results: &mut [(u64, Result<DispatchOutcome, DispatchError>)],
    ) {
        for (claim_id, result) in results.iter_mut() {
            if result.is_ok() {
                continue;
            }
            let Some(claim) = claims.iter().find(|c| c.id == *claim_id) else {
                continue;
            };
            *result = self.retry(claim).await;
        }
    }

    /// Resolve many independent claims with at most `concurrency` in flight.
    /// Results come back in completion order.
    pub async fn dispatch_all(
        &self,
        claims: &[Claim],
        concurrency: usize,
    ) -> Vec<(u64, Result<DispatchOutcome, DispatchError>)> {
        stream::iter(claims)
            .map(|claim| async move { (claim.id, self.dispatch(claim).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Claim the cycle for `claim_id`, or `None` if it is already known.
    fn begin(&self, claim_id: u64) -> Option<CycleGuard<'_>> {
        let mut states = lock(&self.states);
        if states.contains_key(&claim_id) {
            return None;
        }
        states.insert(claim_id, ClaimState::Resolving);

        Some(CycleGuard {
            states: &self.states,
            claim_id,
            settled: false,
        })
    }
}
