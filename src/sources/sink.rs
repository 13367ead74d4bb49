//! Outbound decision sinks.
//!
//! A sink receives each successful decision exactly once. Every record it
//! writes carries the ledger report payload; signing and submission happen
//! downstream.

use crate::error::EmitError;
use crate::models::Decision;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// Action byte for "resolve market" reports.
pub const RESOLVE_ACTION: u8 = 0x01;

const WORD: usize = 32;

/// Consumes emitted decisions.
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn emit(&self, decision: &Decision) -> Result<(), EmitError>;
}

/// Encode the ledger report for a decision: the action byte followed by
/// ABI-encoded `(uint256 claimId, uint8 outcome, uint16 confidence)`.
pub fn encode_report(decision: &Decision) -> Vec<u8> {
    let mut report = Vec::with_capacity(1 + 3 * WORD);
    report.push(RESOLVE_ACTION);
    report.extend_from_slice(&abi_word(&decision.claim_id.to_be_bytes()));
    report.extend_from_slice(&abi_word(&[decision.outcome.code()]));
    report.extend_from_slice(&abi_word(&decision.confidence.bps().to_be_bytes()));
    report
}

/// Left-pad a big-endian integer to one 32-byte word.
fn abi_word(be_bytes: &[u8]) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - be_bytes.len()..].copy_from_slice(be_bytes);
    word
}

/// One line of sink output.
#[derive(Debug, Serialize)]
pub struct LedgerRecord<'a> {
    #[serde(flatten)]
    pub decision: &'a Decision,
    /// Hex-encoded report payload, `0x`-prefixed.
    pub report: String,
}

impl<'a> LedgerRecord<'a> {
    pub fn new(decision: &'a Decision) -> Self {
        Self {
            decision,
            report: format!("0x{}", hex::encode(encode_report(decision))),
        }
    }
}

/// Writes each decision as one JSON line to a shared writer. Emits are
/// serialised so concurrent resolutions never interleave records.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

/// Decisions printed on stdout.
pub type StdoutSink = JsonLinesSink<tokio::io::Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W> DecisionSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&self, decision: &Decision) -> Result<(), EmitError> {
        let mut line = serde_json::to_string(&LedgerRecord::new(decision))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Appends each decision as a JSON line to a ledger file.
#[derive(Debug)]
pub struct LedgerFileSink {
    path: PathBuf,
}

impl LedgerFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DecisionSink for LedgerFileSink {
    async fn emit(&self, decision: &Decision) -> Result<(), EmitError> {
        let mut line = serde_json::to_string(&LedgerRecord::new(decision))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(
            "Appended decision for claim {} to {}",
            decision.claim_id,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Outcome, PipelineType};
    use chrono::Utc;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn decision() -> Decision {
        decision_for(258)
    }

    fn decision_for(claim_id: u64) -> Decision {
        Decision {
            claim_id,
            pipeline_type: PipelineType::PriceThreshold,
            outcome: Outcome::No,
            confidence: Confidence::clamped(8_500),
            evidence_summary: "Price Feed: $1.00 vs threshold $2.00 (above)".to_string(),
            source_label: "Data Feed".to_string(),
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_encode_report_layout() {
        let report = encode_report(&decision());
        assert_eq!(report.len(), 97);
        assert_eq!(report[0], RESOLVE_ACTION);
        // claimId = 0x0102
        assert_eq!(&report[31..33], &[0x01, 0x02]);
        assert!(report[1..31].iter().all(|b| *b == 0));
        // outcome = 1
        assert_eq!(report[64], 1);
        // confidence = 8500 = 0x2134
        assert_eq!(&report[95..97], &[0x21, 0x34]);
    }

    #[tokio::test]
    async fn test_ledger_file_sink_appends_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.jsonl");
        let sink = LedgerFileSink::new(&path);

        sink.emit(&decision()).await.unwrap();
        sink.emit(&decision()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["claim_id"], 258);
        assert_eq!(record["outcome"], "no");
        assert_eq!(record["confidence"], 8500);
        assert_eq!(record["pipeline_type"], 0);
        assert!(record["report"].as_str().unwrap().starts_with("0x01"));
    }

    #[tokio::test]
    async fn test_stdout_sink_emits() {
        StdoutSink::stdout().emit(&decision()).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_emits_keep_one_record_per_line() {
        let sink = std::sync::Arc::new(JsonLinesSink::new(Vec::<u8>::new()));

        let emits = (0..400u64).map(|id| {
            let sink = sink.clone();
            tokio::spawn(async move { sink.emit(&decision_for(id)).await })
        });
        for result in futures::future::join_all(emits).await {
            result.unwrap().unwrap();
        }

        let output = String::from_utf8(sink.writer.lock().await.clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 400);

        let ids: HashSet<u64> = lines
            .iter()
            .map(|line| {
                let record: serde_json::Value = serde_json::from_str(line).unwrap();
                record["claim_id"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(ids.len(), 400);
        assert!(output.ends_with('\n'));
    }
}
