//! Evaluator: scores active rules against a batch of classified outcomes.
//!
//! For each active rule the batch is narrowed to the rule's leak type and
//! every outcome is checked against the rule's conditions (logical AND).
//! Fresh metrics are merged into the stored ones with an exponential moving
//! average, so one noisy batch cannot swing a rule's long-run score.
//!
//! Every condition match is counted as a true positive. The outcome stream
//! has no signal for confirmed-wrong classifications, so precision is 1 for
//! any rule that matched at all. This bias is a known limitation.

mod scoring;

use std::collections::HashMap;

use tracing::debug;

use leakwatch_core::ClassifiedOutcome;

use crate::engine::EvolutionEngine;
use crate::error::Result;
use crate::model::{RuleKey, RulePerformance};

pub use scoring::{count_matches, score_rule, BatchCounts};

impl EvolutionEngine {
    /// Score every active rule against `outcomes` and merge the results.
    ///
    /// Returns the freshly computed batch metrics per scored rule. Rules with
    /// no outcome of their leak type are skipped and left untouched.
    pub fn evaluate_rules(
        &self,
        outcomes: &[ClassifiedOutcome],
    ) -> Result<HashMap<RuleKey, RulePerformance>> {
        let mut results = HashMap::new();
        if outcomes.is_empty() {
            return Ok(results);
        }

        for rule in self.get_active_rules() {
            let key = rule.key.clone();
            let scored = self.locks.with_family(&key.family, || -> Result<Option<RulePerformance>> {
                // Re-read under the lock; a promotion may have retired it.
                let current = match self.stores.rules.get(&key) {
                    Some(r) if r.is_active() => r,
                    _ => return Ok(None),
                };
                let Some(batch) = score_rule(&current, outcomes) else {
                    return Ok(None);
                };
                let merged = current.performance.merge(&batch);
                self.stores.rules.update_performance(&key, merged.clone())?;
                debug!(
                    rule_id = %key,
                    applied = batch.total_applications,
                    matched = batch.successful_applications,
                    f1 = merged.f1_score,
                    "rule evaluated"
                );
                Ok(Some(batch))
            })?;

            if let Some(batch) = scored {
                results.insert(key, batch);
            }
        }

        Ok(results)
    }
}
