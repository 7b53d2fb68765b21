//! Periodic evolution loop.
//!
//! Each cycle walks the active rules, generates mutations for the ones that
//! look weak or have seen enough traffic, and with probability
//! `mutation_rate` applies the first proposal straight away. Tests are never
//! started or completed here.
//!
//! A rule whose earlier proposals are still pending is skipped, so repeated
//! cycles never stack duplicate proposals. Promotion withdraws the parent's
//! leftovers, which lets the successor evolve again.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::EvolutionEngine;
use crate::model::{EvolvableRule, RuleKey, RuleMutation};

/// Active rules scoring below this F1 are always considered for evolution.
pub const UNDERPERFORMING_F1: f64 = 0.75;

/// Whether a rule qualifies for mutation this cycle.
pub fn needs_evolution(rule: &EvolvableRule, min_sample_size: u64) -> bool {
    rule.is_active()
        && (rule.performance.f1_score < UNDERPERFORMING_F1
            || rule.performance.total_applications >= min_sample_size)
}

/// What one auto-evolution cycle did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoEvolveReport {
    /// Rules whose first proposal was applied into a candidate.
    pub evolved_rules: Vec<RuleKey>,
    /// Every mutation proposed this cycle, applied or not.
    pub mutations: Vec<RuleMutation>,
}

impl AutoEvolveReport {
    pub fn is_empty(&self) -> bool {
        self.evolved_rules.is_empty() && self.mutations.is_empty()
    }
}

impl EvolutionEngine {
    /// Run one evolution cycle.
    ///
    /// A no-op returning an empty report unless the engine is both enabled
    /// and configured for auto-evolution. Failures on one rule are logged and
    /// do not stop the cycle.
    pub fn auto_evolve(&self) -> AutoEvolveReport {
        let mut report = AutoEvolveReport::default();
        if !self.config.auto_evolve_active() {
            debug!("auto-evolution disabled, skipping cycle");
            return report;
        }

        let min_sample_size = self.config.min_sample_size;
        for rule in self.get_active_rules() {
            if !needs_evolution(&rule, min_sample_size) {
                continue;
            }
            if self.has_pending_mutations(&rule.key) {
                debug!(rule_id = %rule.key, "earlier proposals still pending, skipping");
                continue;
            }

            let mutations = match self.generate_mutations(&rule.key) {
                Ok(m) => m,
                Err(e) => {
                    warn!(rule_id = %rule.key, error = %e, "mutation generation failed");
                    continue;
                }
            };
            let Some(first) = mutations.first().map(|m| m.id) else {
                continue;
            };

            if self.roll_mutation() {
                match self.apply_mutation(&first) {
                    Ok(candidate) => {
                        debug!(rule_id = %rule.key, candidate_id = %candidate.id, "mutation auto-applied");
                        report.evolved_rules.push(rule.key.clone());
                    }
                    Err(e) => {
                        warn!(rule_id = %rule.key, mutation_id = %first, error = %e, "auto-apply failed");
                    }
                }
            }
            report.mutations.extend(mutations);
        }

        info!(
            evolved = report.evolved_rules.len(),
            mutations = report.mutations.len(),
            "auto-evolution cycle complete"
        );
        report
    }

    fn roll_mutation(&self) -> bool {
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        rng.gen::<f64>() < self.config.mutation_rate
    }
}
