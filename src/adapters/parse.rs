//! Parsing of reasoning-model replies into opinions.
//!
//! Replies are expected to be a JSON object
//! `{"outcome": 0|1|2, "confidence": 0..10000, "evidence": "..."}`,
//! possibly wrapped in a markdown code fence. Unparseable replies degrade to
//! a low-confidence `Invalid` opinion instead of failing the resolution.

use crate::models::{Confidence, Opinion, Outcome};
use serde_json::Value;

/// Evidence attached to a degraded opinion.
pub const PARSE_FAILURE_EVIDENCE: &str = "parse failure";

const MISSING_EVIDENCE: &str = "No evidence provided";

/// Result of interpreting a reasoning reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOpinion {
    /// The reply was a JSON object. Missing fields were defaulted.
    Parsed(Opinion),
    /// The reply could not be read; `opinion` is the degraded fallback.
    Degraded { opinion: Opinion, reason: String },
}

impl ParsedOpinion {
    pub fn into_opinion(self) -> Opinion {
        match self {
            ParsedOpinion::Parsed(opinion) => opinion,
            ParsedOpinion::Degraded { opinion, .. } => opinion,
        }
    }
}

/// Interpret a reasoning reply. Never fails.
pub fn parse_opinion(text: &str, source_label: &str) -> ParsedOpinion {
    let body = strip_code_fence(text);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => return degraded(source_label, e.to_string()),
    };

    let Some(object) = value.as_object() else {
        return degraded(source_label, "reply is not a JSON object".to_string());
    };

    let outcome = object
        .get("outcome")
        .and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        })
        .map(Outcome::from_code)
        .unwrap_or(Outcome::Invalid);

    let confidence = object
        .get("confidence")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .map(Confidence::clamped)
        .unwrap_or(Confidence::UNSTATED);

    let evidence = object
        .get("evidence")
        .and_then(Value::as_str)
        .unwrap_or(MISSING_EVIDENCE);

    ParsedOpinion::Parsed(Opinion::new(outcome, confidence, evidence, source_label))
}

fn degraded(source_label: &str, reason: String) -> ParsedOpinion {
    ParsedOpinion::Degraded {
        opinion: Opinion::new(
            Outcome::Invalid,
            Confidence::PARSE_FAILURE,
            PARSE_FAILURE_EVIDENCE,
            source_label,
        ),
        reason,
    }
}

/// Remove a surrounding ```` ```json ```` fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
