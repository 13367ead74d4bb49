//! Batch outcome reporting.

mod generator;

pub use generator::{generate_json_report, generate_text_report};

use crate::dispatcher::{ClaimState, DispatchOutcome};
use crate::error::DispatchError;
use crate::models::{Decision, Outcome};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Run-level details shown at the top of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    pub rpc_url: String,
    /// Where decisions were emitted (`stdout` or a ledger file path).
    pub sink: String,
    pub duration_seconds: f64,
}

/// A claim that was already in flight or settled when requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedClaim {
    pub claim_id: u64,
    pub state: ClaimState,
}

/// A claim whose cycle ended without a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedClaim {
    pub claim_id: u64,
    pub reason: String,
}

/// Counts across a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub yes: usize,
    pub no: usize,
    pub invalid: usize,
}

/// Everything that happened to one batch of claims.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub metadata: ReportMetadata,
    pub summary: BatchSummary,
    pub decisions: Vec<Decision>,
    pub skipped: Vec<SkippedClaim>,
    pub failures: Vec<FailedClaim>,
}

impl BatchReport {
    /// Sort dispatcher results into decisions, no-ops and failures, ordered
    /// by claim id.
    pub fn from_results(
        metadata: ReportMetadata,
        results: Vec<(u64, Result<DispatchOutcome, DispatchError>)>,
    ) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..BatchSummary::default()
        };
        let mut decisions = Vec::new();
        let mut skipped = Vec::new();
        let mut failures = Vec::new();

        for (_, result) in results {
            match result {
                Ok(DispatchOutcome::Resolved(decision)) => {
                    match decision.outcome {
                        Outcome::Yes => summary.yes += 1,
                        Outcome::No => summary.no += 1,
                        Outcome::Invalid => summary.invalid += 1,
                    }
                    decisions.push(decision);
                }
                Ok(DispatchOutcome::AlreadySettled { claim_id, state }) => {
                    skipped.push(SkippedClaim { claim_id, state });
                }
                Err(e) => failures.push(FailedClaim {
                    claim_id: e.claim_id(),
                    reason: e.to_string(),
                }),
            }
        }

        decisions.sort_by_key(|d| d.claim_id);
        skipped.sort_by_key(|s| s.claim_id);
        failures.sort_by_key(|f| f.claim_id);

        summary.resolved = decisions.len();
        summary.skipped = skipped.len();
        summary.failed = failures.len();

        Self {
            metadata,
            summary,
            decisions,
            skipped,
            failures,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
