//! Error taxonomy for the resolution engine.

use std::time::Duration;

/// Failure reported by a source adapter or one of its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network or contract-call failure.
    #[error("source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The collaborator answered with something that cannot be interpreted.
    #[error("malformed response ({source_name}): {reason}")]
    MalformedResponse { source_name: String, reason: String },
}

impl SourceError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// A pipeline code with no registered strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline type: {0}")]
pub struct UnknownPipelineType(pub u8);

/// Failure of the outbound decision sink.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to write decision: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode decision: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Terminal failure of a resolution cycle. No decision was emitted.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("resolution failed for claim {claim_id}: {cause}")]
    ResolutionFailed { claim_id: u64, cause: SourceError },

    #[error("resolution of claim {claim_id} timed out after {after:?}")]
    TimedOut { claim_id: u64, after: Duration },

    #[error("failed to emit decision for claim {claim_id}: {source}")]
    EmitFailed {
        claim_id: u64,
        #[source]
        source: EmitError,
    },
}

impl DispatchError {
    pub fn claim_id(&self) -> u64 {
        match self {
            DispatchError::ResolutionFailed { claim_id, .. }
            | DispatchError::TimedOut { claim_id, .. }
            | DispatchError::EmitFailed { claim_id, .. } => *claim_id,
        }
    }
}

/// Invalid decimal literal for a fixed-point amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixedPointError {
    #[error("invalid decimal: {0:?}")]
    Invalid(String),

    #[error("more than 8 fractional digits: {0:?}")]
    TooPrecise(String),

    #[error("amount out of range: {0:?}")]
    Overflow(String),
}
