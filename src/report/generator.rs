//! Text and JSON rendering of batch reports.

use super::{BatchReport, BatchSummary, ReportMetadata};
use crate::models::Outcome;
use anyhow::Result;

/// Generate a human-readable summary.
pub fn generate_text_report(report: &BatchReport) -> String {
    let mut output = String::new();

    output.push_str("📊 Resolution Summary\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_decisions_section(report));

    if !report.skipped.is_empty() {
        output.push_str("⏭️  Already settled:\n");
        for skipped in &report.skipped {
            output.push_str(&format!("   #{} ({})\n", skipped.claim_id, skipped.state));
        }
        output.push('\n');
    }

    if !report.failures.is_empty() {
        output.push_str("❌ Failed:\n");
        for failure in &report.failures {
            output.push_str(&format!("   #{}: {}\n", failure.claim_id, failure.reason));
        }
        output.push('\n');
    }

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "   Date: {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("   Model: {}\n", metadata.model_used));
    section.push_str(&format!("   RPC: {}\n", metadata.rpc_url));
    section.push_str(&format!("   Decisions written to: {}\n", metadata.sink));
    section.push_str(&format!("   Duration: {:.1}s\n\n", metadata.duration_seconds));

    section
}

fn generate_summary_section(summary: &BatchSummary) -> String {
    format!(
        "   Claims: {} | ✅ Resolved: {} | ⏭️  Skipped: {} | ❌ Failed: {}\n   \
         Outcomes: YES {} | NO {} | INVALID {}\n\n",
        summary.total,
        summary.resolved,
        summary.skipped,
        summary.failed,
        summary.yes,
        summary.no,
        summary.invalid
    )
}

fn generate_decisions_section(report: &BatchReport) -> String {
    if report.decisions.is_empty() {
        return String::new();
    }

    let mut section = String::from("🧾 Decisions:\n");
    for decision in &report.decisions {
        let marker = match decision.outcome {
            Outcome::Yes => "🟢",
            Outcome::No => "🔴",
            Outcome::Invalid => "⚪",
        };
        section.push_str(&format!(
            "   {} #{} {} ({}) via {} [{}]\n      {}\n",
            marker,
            decision.claim_id,
            decision.outcome,
            decision.confidence,
            decision.source_label,
            decision.pipeline_type,
            decision.evidence_summary
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
