//! Data models for the resolution engine.
//!
//! This module contains the core data structures used throughout
//! the application for representing claims, opinions, and decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::FixedPointError;

/// Number of implied fractional digits in a [`FixedPoint`] value.
pub const FIXED_POINT_DECIMALS: u32 = 8;

const FIXED_POINT_SCALE: i64 = 10_i64.pow(FIXED_POINT_DECIMALS);

/// The all-zero address used on-chain to mean "no price source".
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Outcome of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Yes,
    No,
    Invalid,
}

impl Outcome {
    /// Numeric code used by the reasoning protocol and the ledger payload.
    pub fn code(&self) -> u8 {
        match self {
            Outcome::Yes => 0,
            Outcome::No => 1,
            Outcome::Invalid => 2,
        }
    }

    /// Map a protocol code to an outcome. Anything outside 0..=2 is invalid.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Outcome::Yes,
            1 => Outcome::No,
            _ => Outcome::Invalid,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
            Outcome::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Confidence in basis points, always within `[0, 10000]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Confidence(u16);

impl Confidence {
    pub const MAX_BPS: u16 = 10_000;
    /// Deterministic sources.
    pub const CERTAIN: Confidence = Confidence(10_000);
    /// Composite runs where no side reached the agreement threshold.
    pub const NO_CONSENSUS: Confidence = Confidence(5_000);
    /// Reasoning responses that omit a confidence.
    pub const UNSTATED: Confidence = Confidence(5_000);
    /// Reasoning responses that could not be parsed.
    pub const PARSE_FAILURE: Confidence = Confidence(3_000);

    /// Clamp any integer into the valid basis-point range.
    pub fn clamped(bps: i64) -> Self {
        Self(bps.clamp(0, Self::MAX_BPS as i64) as u16)
    }

    /// Basis points.
    pub fn bps(&self) -> u16 {
        self.0
    }

    /// Confidence as a percentage, e.g. `85.5` for 8550 bps.
    pub fn percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(Confidence::clamped(raw))
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Signed decimal with 8 implied fractional digits (raw units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FixedPoint(i64);

impl FixedPoint {
    /// Build from raw units, e.g. `500000000000` is `5000.00000000`.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    /// Lossy conversion for display.
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / FIXED_POINT_SCALE as f64
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_f64())
    }
}

impl FromStr for FixedPoint {
    type Err = FixedPointError;

    /// Accepts decimal notation (`"5000.5"`, `"-0.25"`). A string without a
    /// decimal point is a whole-unit amount, not raw units.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(FixedPointError::Invalid(s.to_string()));
        }
        if frac.len() > FIXED_POINT_DECIMALS as usize {
            return Err(FixedPointError::TooPrecise(s.to_string()));
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(FixedPointError::Invalid(s.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| FixedPointError::Overflow(s.to_string()))?
        };
        let frac_units: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = FIXED_POINT_DECIMALS as usize);
            padded
                .parse()
                .map_err(|_| FixedPointError::Invalid(s.to_string()))?
        };

        let magnitude = whole
            .checked_mul(FIXED_POINT_SCALE)
            .and_then(|w| w.checked_add(frac_units))
            .ok_or_else(|| FixedPointError::Overflow(s.to_string()))?;

        Ok(Self(if negative { -magnitude } else { magnitude }))
    }
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    /// Integers are raw units; strings are decimal notation.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Raw(i64),
            Decimal(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Raw(raw) => Ok(FixedPoint(raw)),
            Repr::Decimal(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Which strategy resolves a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum PipelineType {
    PriceThreshold,
    StreamingThreshold,
    ExternalApiProxy,
    GroundedReasoning,
    Composite,
    /// A code this build does not know about.
    Other(u8),
}

impl PipelineType {
    pub fn code(&self) -> u8 {
        match self {
            PipelineType::PriceThreshold => 0,
            PipelineType::StreamingThreshold => 1,
            PipelineType::ExternalApiProxy => 2,
            PipelineType::GroundedReasoning => 3,
            PipelineType::Composite => 4,
            PipelineType::Other(code) => *code,
        }
    }
}

impl From<u8> for PipelineType {
    fn from(code: u8) -> Self {
        match code {
            0 => PipelineType::PriceThreshold,
            1 => PipelineType::StreamingThreshold,
            2 => PipelineType::ExternalApiProxy,
            3 => PipelineType::GroundedReasoning,
            4 => PipelineType::Composite,
            other => PipelineType::Other(other),
        }
    }
}

impl From<PipelineType> for u8 {
    fn from(pipeline: PipelineType) -> Self {
        pipeline.code()
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineType::PriceThreshold => write!(f, "PRICE_FEED"),
            PipelineType::StreamingThreshold => write!(f, "DATA_STREAM"),
            PipelineType::ExternalApiProxy => write!(f, "FUNCTIONS_API"),
            PipelineType::GroundedReasoning => write!(f, "AI_GROUNDED"),
            PipelineType::Composite => write!(f, "COMPOSITE"),
            PipelineType::Other(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// Comparison direction for threshold pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdDirection {
    #[default]
    Above,
    Below,
}

impl fmt::Display for ThresholdDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdDirection::Above => write!(f, "above"),
            ThresholdDirection::Below => write!(f, "below"),
        }
    }
}

/// Per-claim pipeline settings. Each adapter reads only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Feed name (looked up in the feed table) or raw feed address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_source: Option<String>,

    #[serde(default)]
    pub threshold: FixedPoint,

    #[serde(default)]
    pub direction: ThresholdDirection,

    /// Minimum same-outcome opinions for a composite outcome to be authoritative.
    #[serde(default = "default_required_agreement")]
    pub required_agreement: u32,

    /// Digest of the externally registered prompt, carried for auditing.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "prompt_hash_hex"
    )]
    pub prompt_hash: Option<[u8; 32]>,
}

fn default_required_agreement() -> u32 {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            price_source: None,
            threshold: FixedPoint::default(),
            direction: ThresholdDirection::default(),
            required_agreement: default_required_agreement(),
            prompt_hash: None,
        }
    }
}

impl PipelineConfig {
    /// The configured price source, treating empty strings and the zero
    /// address as absent.
    pub fn price_source(&self) -> Option<&str> {
        self.price_source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(ZERO_ADDRESS))
    }

    /// Agreement threshold, never below one.
    pub fn required_agreement(&self) -> usize {
        self.required_agreement.max(1) as usize
    }
}

mod prompt_hash_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error> {
        match hash {
            Some(bytes) => serializer.serialize_str(&format!("0x{}", hex::encode(bytes))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let digits = s.trim().trim_start_matches("0x");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Some(bytes))
    }
}

/// Inbound resolution trigger as delivered by the event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub claim_id: u64,
    pub pipeline_type: u8,
    pub question: String,
    #[serde(default)]
    pub config: PipelineConfig,
}

impl ResolveRequest {
    pub fn into_claim(self) -> Claim {
        Claim {
            id: self.claim_id,
            question: self.question,
            pipeline_type: PipelineType::from(self.pipeline_type),
            config: self.config,
        }
    }
}

/// A yes/no question awaiting an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: u64,
    pub question: String,
    pub pipeline_type: PipelineType,
    pub config: PipelineConfig,
}

/// One source's independent judgment of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opinion {
    pub outcome: Outcome,
    pub confidence: Confidence,
    pub evidence: String,
    pub source_label: String,
}

impl Opinion {
    pub fn new(
        outcome: Outcome,
        confidence: Confidence,
        evidence: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            outcome,
            confidence,
            evidence: evidence.into(),
            source_label: source_label.into(),
        }
    }

    /// Terse `LABEL: OUTCOME (pct%)` summary used in composite evidence.
    pub fn summary(&self) -> String {
        format!("{}: {} ({})", self.source_label, self.outcome, self.confidence)
    }
}

/// The final, emitted outcome for a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub claim_id: u64,
    pub pipeline_type: PipelineType,
    pub outcome: Outcome,
    pub confidence: Confidence,
    pub evidence_summary: String,
    /// Label of the strategy that produced the opinion.
    pub source_label: String,
    pub resolved_at: DateTime<Utc>,
}

impl Decision {
    /// Build a decision from the opinion of the strategy that ran.
    pub fn from_opinion(claim: &Claim, opinion: Opinion) -> Self {
        Self {
            claim_id: claim.id,
            pipeline_type: claim.pipeline_type,
            outcome: opinion.outcome,
            confidence: opinion.confidence,
            evidence_summary: opinion.evidence,
            source_label: opinion.source_label,
            resolved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clamping() {
        assert_eq!(Confidence::clamped(12_000).bps(), 10_000);
        assert_eq!(Confidence::clamped(-500).bps(), 0);
        assert_eq!(Confidence::clamped(8_500).bps(), 8_500);
        assert_eq!(Confidence::clamped(8_550).to_string(), "85.5%");
    }

    #[test]
    fn test_confidence_deserialize_clamps() {
        let c: Confidence = serde_json::from_str("12000").unwrap();
        assert_eq!(c, Confidence::CERTAIN);
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(Outcome::from_code(0), Outcome::Yes);
        assert_eq!(Outcome::from_code(1), Outcome::No);
        assert_eq!(Outcome::from_code(2), Outcome::Invalid);
        assert_eq!(Outcome::from_code(7), Outcome::Invalid);
        assert_eq!(Outcome::No.code(), 1);
    }

    #[test]
    fn test_fixed_point_parse() {
        assert_eq!("5000".parse::<FixedPoint>().unwrap().raw(), 500_000_000_000);
        assert_eq!("5000.5".parse::<FixedPoint>().unwrap().raw(), 500_050_000_000);
        assert_eq!("-0.25".parse::<FixedPoint>().unwrap().raw(), -25_000_000);
        assert_eq!(".5".parse::<FixedPoint>().unwrap().raw(), 50_000_000);
        assert!("1.123456789".parse::<FixedPoint>().is_err());
        assert!("12a".parse::<FixedPoint>().is_err());
        assert!("-".parse::<FixedPoint>().is_err());
        assert!("99999999999999".parse::<FixedPoint>().is_err());
    }

    #[test]
    fn test_fixed_point_display() {
        assert_eq!(FixedPoint::from_raw(510_000_000_000).to_string(), "5100.00");
        assert_eq!(FixedPoint::from_raw(-25_000_000).to_string(), "-0.25");
    }

    #[test]
    fn test_fixed_point_deserialize_raw_and_decimal() {
        let raw: FixedPoint = serde_json::from_str("500000000000").unwrap();
        let decimal: FixedPoint = serde_json::from_str("\"5000\"").unwrap();
        assert_eq!(raw, decimal);
    }

    #[test]
    fn test_pipeline_type_codes() {
        assert_eq!(PipelineType::from(4), PipelineType::Composite);
        assert_eq!(PipelineType::from(9), PipelineType::Other(9));
        assert_eq!(PipelineType::Other(9).code(), 9);
    }

    #[test]
    fn test_price_source_absent_variants() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.price_source(), None);

        config.price_source = Some(ZERO_ADDRESS.to_string());
        assert_eq!(config.price_source(), None);

        config.price_source = Some("  ".to_string());
        assert_eq!(config.price_source(), None);

        config.price_source = Some("ETH/USD".to_string());
        assert_eq!(config.price_source(), Some("ETH/USD"));
    }

    #[test]
    fn test_required_agreement_floor() {
        let config = PipelineConfig {
            required_agreement: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.required_agreement(), 1);
        assert_eq!(PipelineConfig::default().required_agreement(), 2);
    }

    #[test]
    fn test_pipeline_config_from_toml() {
        let toml_content = r#"
price_source = "BTC/USD"
threshold = "65000.5"
direction = "below"
prompt_hash = "0x0101010101010101010101010101010101010101010101010101010101010101"
"#;
        let config: PipelineConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.price_source(), Some("BTC/USD"));
        assert_eq!(config.threshold.raw(), 6_500_050_000_000);
        assert_eq!(config.direction, ThresholdDirection::Below);
        assert_eq!(config.required_agreement, 2);
        assert_eq!(config.prompt_hash, Some([1u8; 32]));
    }

    #[test]
    fn test_resolve_request_into_claim() {
        let request = ResolveRequest {
            claim_id: 7,
            pipeline_type: 9,
            question: "Will it rain?".to_string(),
            config: PipelineConfig::default(),
        };
        let claim = request.into_claim();
        assert_eq!(claim.id, 7);
        assert_eq!(claim.pipeline_type, PipelineType::Other(9));
    }

    #[test]
    fn test_opinion_summary() {
        let opinion = Opinion::new(Outcome::Yes, Confidence::clamped(8_000), "e", "Grounded AI");
        assert_eq!(opinion.summary(), "Grounded AI: YES (80%)");
    }
}
