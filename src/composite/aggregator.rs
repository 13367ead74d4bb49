//! Agreement rule for composite resolution.
//!
//! This module turns a set of independent opinions into one opinion using an
//! N-of-M agreement threshold.

use crate::models::{Confidence, Opinion, Outcome};

pub const COMPOSITE_LABEL: &str = "Composite";

/// Vote counts across a set of opinions. `Invalid` votes for neither side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub yes: usize,
    pub no: usize,
    pub invalid: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.yes + self.no + self.invalid
    }
}

/// Count votes per outcome.
pub fn tally(opinions: &[Opinion]) -> Tally {
    let mut tally = Tally::default();

    for opinion in opinions {
        match opinion.outcome {
            Outcome::Yes => tally.yes += 1,
            Outcome::No => tally.no += 1,
            Outcome::Invalid => tally.invalid += 1,
        }
    }

    tally
}

/// Mean confidence of the opinions voting `outcome`, rounded half up.
pub fn mean_confidence(opinions: &[Opinion], outcome: Outcome) -> Confidence {
    let (sum, count) = opinions
        .iter()
        .filter(|o| o.outcome == outcome)
        .fold((0u64, 0u64), |(sum, count), o| (sum + o.confidence.bps() as u64, count + 1));

    if count == 0 {
        return Confidence::NO_CONSENSUS;
    }

    Confidence::clamped(((2 * sum + count) / (2 * count)) as i64)
}

/// Combine opinions under an agreement threshold of `required` votes.
///
/// A side reaching the threshold wins with the mean confidence of its own
/// voters. Otherwise the larger side wins (ties go to `Yes`) with a fixed
/// no-consensus confidence.
pub fn aggregate(opinions: &[Opinion], required: usize) -> Opinion {
    let votes = tally(opinions);
    let required = required.max(1);

    let (outcome, confidence) = if votes.yes >= required {
        (Outcome::Yes, mean_confidence(opinions, Outcome::Yes))
    } else if votes.no >= required {
        (Outcome::No, mean_confidence(opinions, Outcome::No))
    } else if votes.yes >= votes.no {
        (Outcome::Yes, Confidence::NO_CONSENSUS)
    } else {
        (Outcome::No, Confidence::NO_CONSENSUS)
    };

    Opinion::new(outcome, confidence, evidence_summary(opinions, &votes), COMPOSITE_LABEL)
}

/// `Composite [yes/total YES]: label: OUTCOME (pct%); ...` in input order.
pub fn evidence_summary(opinions: &[Opinion], votes: &Tally) -> String {
    let sources: Vec<String> = opinions.iter().map(Opinion::summary).collect();
    format!(
        "Composite [{}/{} YES]: {}",
        votes.yes,
        votes.total(),
        sources.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opinion(label: &str, outcome: Outcome, bps: i64) -> Opinion {
        Opinion::new(outcome, Confidence::clamped(bps), "e", label)
    }

    #[test]
    fn test_tally_ignores_invalid() {
        let opinions = vec![
            opinion("a", Outcome::Yes, 1),
            opinion("b", Outcome::Invalid, 1),
            opinion("c", Outcome::No, 1),
            opinion("d", Outcome::Yes, 1),
        ];
        assert_eq!(
            tally(&opinions),
            Tally {
                yes: 2,
                no: 1,
                invalid: 1
            }
        );
    }

    #[test]
    fn test_agreeing_side_uses_mean_of_its_own_voters() {
        let opinions = vec![
            opinion("Data Feed", Outcome::Yes, 10_000),
            opinion("Grounded AI", Outcome::Yes, 7_001),
            opinion("API Proxy", Outcome::No, 2_000),
        ];

        let result = aggregate(&opinions, 2);

        assert_eq!(result.outcome, Outcome::Yes);
        // (10000 + 7001) / 2 = 8500.5 -> 8501
        assert_eq!(result.confidence.bps(), 8_501);
        assert_eq!(result.source_label, COMPOSITE_LABEL);
    }

    #[test]
    fn test_no_side_reaching_threshold() {
        let opinions = vec![
            opinion("Grounded AI", Outcome::No, 9_000),
            opinion("API Proxy", Outcome::No, 8_000),
            opinion("Data Feed", Outcome::Yes, 10_000),
        ];

        let result = aggregate(&opinions, 2);

        assert_eq!(result.outcome, Outcome::No);
        assert_eq!(result.confidence.bps(), 8_500);
    }

    #[test]
    fn test_split_vote_breaks_tie_toward_yes() {
        let opinions = vec![
            opinion("Grounded AI", Outcome::Yes, 8_000),
            opinion("API Proxy", Outcome::No, 7_000),
        ];

        let result = aggregate(&opinions, 2);

        assert_eq!(result.outcome, Outcome::Yes);
        assert_eq!(result.confidence.bps(), 5_000);
    }

    #[test]
    fn test_majority_without_threshold_keeps_fixed_confidence() {
        let opinions = vec![
            opinion("Data Feed", Outcome::No, 10_000),
            opinion("Grounded AI", Outcome::No, 9_900),
            opinion("API Proxy", Outcome::Yes, 9_900),
        ];

        let result = aggregate(&opinions, 3);

        assert_eq!(result.outcome, Outcome::No);
        assert_eq!(result.confidence.bps(), 5_000);
    }

    #[test]
    fn test_threshold_above_source_count_falls_through_to_tie_break() {
        let opinions = vec![
            opinion("Grounded AI", Outcome::Yes, 9_000),
            opinion("API Proxy", Outcome::Yes, 9_000),
        ];

        let result = aggregate(&opinions, 3);

        assert_eq!(result.outcome, Outcome::Yes);
        assert_eq!(result.confidence.bps(), 5_000);
    }

    #[test]
    fn test_all_invalid_resolves_yes_without_consensus() {
        let opinions = vec![
            opinion("Grounded AI", Outcome::Invalid, 3_000),
            opinion("API Proxy", Outcome::Invalid, 3_000),
        ];

        let result = aggregate(&opinions, 2);

        assert_eq!(result.outcome, Outcome::Yes);
        assert_eq!(result.confidence.bps(), 5_000);
    }

    #[test]
    fn test_single_vote_threshold() {
        let opinions = vec![
            opinion("Grounded AI", Outcome::Invalid, 3_000),
            opinion("API Proxy", Outcome::No, 6_100),
        ];

        let result = aggregate(&opinions, 1);

        assert_eq!(result.outcome, Outcome::No);
        assert_eq!(result.confidence.bps(), 6_100);
    }

    #[test]
    fn test_evidence_lists_sources_in_order() {
        let opinions = vec![
            opinion("Data Feed", Outcome::Yes, 10_000),
            opinion("Grounded AI", Outcome::No, 8_550),
            opinion("API Proxy", Outcome::Invalid, 3_000),
        ];

        let result = aggregate(&opinions, 2);

        assert_eq!(
            result.evidence,
            "Composite [1/3 YES]: Data Feed: YES (100%); Grounded AI: NO (85.5%); API Proxy: INVALID (30%)"
        );
    }
}
