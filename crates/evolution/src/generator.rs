//! Mutation generator: local, one-rule-at-a-time proposals.
//!
//! For each numeric condition two threshold moves are proposed: one 10% up
//! (fewer false positives) and one 10% down (more recall). A zero threshold
//! moves by an absolute step of 0.1 instead. Conditions with confidence
//! below 0.7 are bundled into a single removal proposal. No combinations
//! across conditions are explored.

use tracing::debug;

use crate::engine::EvolutionEngine;
use crate::error::{EvolutionError, Result};
use crate::model::{
    ConditionRef, EvolvableRule, HistoryEventType, MutationChange, RuleKey, RuleMutation,
};

/// Relative step applied to numeric thresholds.
pub const THRESHOLD_STEP: f64 = 0.1;

/// Conditions below this confidence are proposed for removal.
pub const LOW_CONFIDENCE: f64 = 0.7;

/// Decimal places kept on generated thresholds.
const THRESHOLD_DECIMALS: i32 = 9;

/// Raised and lowered thresholds for `from`, in that order.
///
/// The step is relative to the magnitude, so "raised" is always the larger
/// value, negative thresholds included.
pub fn threshold_moves(from: f64) -> (f64, f64) {
    let step = if from == 0.0 {
        THRESHOLD_STEP
    } else {
        from.abs() * THRESHOLD_STEP
    };
    (round_threshold(from + step), round_threshold(from - step))
}

/// Trim binary noise such as `110.00000000000001` back to `110`.
fn round_threshold(value: f64) -> f64 {
    let scale = 10f64.powi(THRESHOLD_DECIMALS);
    let scaled = (value * scale).round();
    if scaled.is_finite() {
        scaled / scale
    } else {
        value
    }
}

/// Propose mutations for a rule. Pure; nothing is stored.
pub fn propose_mutations(rule: &EvolvableRule) -> Vec<RuleMutation> {
    let mut mutations = Vec::new();

    for (index, condition) in rule.conditions.iter().enumerate() {
        let Some(from) = condition.value.as_f64() else {
            continue;
        };
        let (raised, lowered) = threshold_moves(from);

        mutations.push(RuleMutation::proposed(
            rule.key.clone(),
            MutationChange::ThresholdAdjust {
                index,
                field: condition.field.clone(),
                from,
                to: raised,
            },
            format!(
                "Raising the {} threshold from {} to {} should cut false positives and raise precision",
                condition.field, from, raised
            ),
        ));
        mutations.push(RuleMutation::proposed(
            rule.key.clone(),
            MutationChange::ThresholdAdjust {
                index,
                field: condition.field.clone(),
                from,
                to: lowered,
            },
            format!(
                "Lowering the {} threshold from {} to {} should catch more leaks and raise recall",
                condition.field, from, lowered
            ),
        ));
    }

    let weak: Vec<ConditionRef> = rule
        .conditions
        .iter()
        .enumerate()
        .filter(|(_, c)| c.confidence < LOW_CONFIDENCE)
        .map(|(index, c)| ConditionRef::new(index, c.field.clone()))
        .collect();
    if !weak.is_empty() {
        let change = MutationChange::ConditionRemove { conditions: weak };
        let hypothesis = format!(
            "Removing low-confidence conditions ({}) should simplify the rule without hurting accuracy",
            change.fields().join(", ")
        );
        mutations.push(RuleMutation::proposed(rule.key.clone(), change, hypothesis));
    }

    mutations
}

impl EvolutionEngine {
    /// Propose and store mutations for a rule.
    ///
    /// Every returned mutation is in `proposed` status.
    pub fn generate_mutations(&self, key: &RuleKey) -> Result<Vec<RuleMutation>> {
        let rule = self.require_rule(key)?;
        let mutations = propose_mutations(&rule);
        if mutations.is_empty() {
            debug!(rule_id = %key, "no mutations to propose");
            return Ok(mutations);
        }

        for mutation in &mutations {
            self.stores.mutations.insert(mutation.clone())?;
        }

        self.record(
            key,
            HistoryEventType::Mutated,
            serde_json::json!({
                "action": "proposed",
                "mutations": mutations
                    .iter()
                    .map(|m| serde_json::json!({ "id": m.id, "type": m.mutation_type() }))
                    .collect::<Vec<_>>(),
            }),
        );
        debug!(rule_id = %key, count = mutations.len(), "mutations proposed");
        Ok(mutations)
    }

    /// Store an operator-authored mutation.
    ///
    /// This is the only source of `condition_add` changes. Threshold moves
    /// must target a numeric condition the rule actually has.
    pub fn propose_mutation(
        &self,
        key: &RuleKey,
        change: MutationChange,
        hypothesis: impl Into<String>,
    ) -> Result<RuleMutation> {
        let rule = self.require_rule(key)?;
        validate_change(&rule, &change)?;

        let mutation = RuleMutation::proposed(key.clone(), change, hypothesis);
        self.stores.mutations.insert(mutation.clone())?;
        self.record(
            key,
            HistoryEventType::Mutated,
            serde_json::json!({
                "action": "proposed",
                "mutations": [{ "id": mutation.id, "type": mutation.mutation_type() }],
                "hypothesis": mutation.hypothesis,
            }),
        );
        debug!(rule_id = %key, mutation_id = %mutation.id, "mutation proposed by operator");
        Ok(mutation)
    }
}

fn validate_change(rule: &EvolvableRule, change: &MutationChange) -> Result<()> {
    match change {
        MutationChange::ThresholdAdjust {
            index,
            field,
            from,
            to,
        } => {
            if !to.is_finite() {
                return Err(EvolutionError::Validation(format!(
                    "threshold for '{}' must be finite",
                    field
                )));
            }
            let current = rule
                .conditions
                .get(*index)
                .filter(|c| &c.field == field)
                .and_then(|c| c.value.as_f64())
                .ok_or_else(|| {
                    EvolutionError::Validation(format!(
                        "rule {} has no numeric condition on '{}' at position {}",
                        rule.key, field, index
                    ))
                })?;
            if current != *from {
                return Err(EvolutionError::Validation(format!(
                    "condition {} of rule {} has threshold {}, not {}",
                    index, rule.key, current, from
                )));
            }
        }
        MutationChange::ConditionRemove { conditions } => {
            if conditions.is_empty() {
                return Err(EvolutionError::Validation(
                    "condition_remove needs at least one condition".to_string(),
                ));
            }
            if let Some(target) = conditions.iter().find(|c| !c.resolves_in(&rule.conditions)) {
                return Err(EvolutionError::Validation(format!(
                    "rule {} has no condition on '{}' at position {}",
                    rule.key, target.field, target.index
                )));
            }
        }
        MutationChange::ConditionAdd { condition } => condition.validate()?,
    }
    Ok(())
}
