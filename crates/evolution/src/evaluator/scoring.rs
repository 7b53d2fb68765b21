//! Batch scoring of a single rule against classified outcomes.

use leakwatch_core::ClassifiedOutcome;

use crate::model::{EvolvableRule, RulePerformance};

/// Confusion counts for one rule over one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchCounts {
    /// Outcomes of the rule's leak type.
    pub applicable: u64,
    /// Applicable outcomes on which every condition held.
    pub true_positives: u64,
    /// Always zero: the outcome stream carries no negative signal.
    pub false_positives: u64,
    pub matched_impact: f64,
}

impl BatchCounts {
    pub fn average_impact(&self) -> f64 {
        if self.true_positives == 0 {
            0.0
        } else {
            self.matched_impact / self.true_positives as f64
        }
    }

    pub fn performance(&self) -> RulePerformance {
        RulePerformance::from_counts(
            self.true_positives,
            self.false_positives,
            self.applicable,
            self.average_impact(),
        )
    }
}

/// Count how the rule fares on the outcomes of its own leak type.
pub fn count_matches(rule: &EvolvableRule, outcomes: &[ClassifiedOutcome]) -> BatchCounts {
    let mut counts = BatchCounts::default();
    for outcome in outcomes.iter().filter(|o| o.leak_type == rule.leak_type) {
        counts.applicable += 1;
        // Every condition match counts as a hit. Nothing in the batch can
        // confirm a classification as wrong.
        if rule.matches(outcome) {
            counts.true_positives += 1;
            counts.matched_impact += outcome.impact;
        }
    }
    counts
}

/// Fresh batch metrics for a rule, or `None` when no outcome applies to it.
pub fn score_rule(rule: &EvolvableRule, outcomes: &[ClassifiedOutcome]) -> Option<RulePerformance> {
    let counts = count_matches(rule, outcomes);
    if counts.applicable == 0 {
        return None;
    }
    Some(counts.performance())
}
