//! Candidate builder: turns a mutation into a complete alternate rule body.
//!
//! The parent rule is never edited in place. A candidate carries its own
//! copy of the parent's conditions and actions with the change applied.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::EvolutionEngine;
use crate::error::{EvolutionError, Result};
use crate::model::{
    EvolvableRule, HistoryEventType, MutationChange, MutationStatus, RuleAction, RuleCandidate,
    RuleCondition, RuleKey, RuleMutation, TestPeriod,
};

/// Fixed heuristic recorded on every generated candidate. It is not derived
/// from any data.
pub const EXPECTED_IMPROVEMENT: f64 = 0.05;

/// Apply a change to a copy of `conditions`.
///
/// Only the conditions the change points at are touched. A reference that
/// no longer resolves to the named field is ignored.
pub fn apply_change(conditions: &[RuleCondition], change: &MutationChange) -> Vec<RuleCondition> {
    let mut out = conditions.to_vec();
    match change {
        MutationChange::ThresholdAdjust {
            index,
            field,
            from,
            to,
        } => {
            if let Some(condition) = out.get_mut(*index).filter(|c| {
                &c.field == field && c.value.as_f64() == Some(*from)
            }) {
                condition.value = leakwatch_core::FieldValue::Float(*to);
            }
        }
        MutationChange::ConditionRemove { conditions: targets } => {
            let drop: Vec<usize> = targets
                .iter()
                .filter(|t| t.resolves_in(conditions))
                .map(|t| t.index)
                .collect();
            out = out
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !drop.contains(i))
                .map(|(_, c)| c)
                .collect();
        }
        MutationChange::ConditionAdd { condition } => out.push(condition.clone()),
    }
    out
}

/// Build a candidate from a rule and one of its mutations. Pure.
pub fn build_candidate(
    rule: &EvolvableRule,
    mutation: &RuleMutation,
    now: DateTime<Utc>,
    testing_period_days: u32,
) -> Result<RuleCandidate> {
    Ok(RuleCandidate {
        id: Uuid::new_v4(),
        parent: Some(rule.key.clone()),
        mutation_id: Some(mutation.id),
        conditions: apply_change(&rule.conditions, &mutation.change),
        actions: rule.actions.clone(),
        hypothesis: mutation.hypothesis.clone(),
        expected_improvement: EXPECTED_IMPROVEMENT,
        test_period: TestPeriod::starting_at(now, testing_period_days)?,
        test_results: None,
        created_at: now,
    })
}

impl EvolutionEngine {
    /// Materialize a proposed mutation into a candidate and move the mutation
    /// to `testing`. Both writes happen under the rule family's lock.
    pub fn apply_mutation(&self, mutation_id: &Uuid) -> Result<RuleCandidate> {
        let family = self.require_mutation(mutation_id)?.rule.family;

        self.locks.with_family(&family, || {
            let mut mutation = self.require_mutation(mutation_id)?;
            if mutation.status != MutationStatus::Proposed {
                return Err(EvolutionError::InvalidState(format!(
                    "mutation {} is {}, expected proposed",
                    mutation.id, mutation.status
                )));
            }
            let rule = self.require_rule(&mutation.rule)?;

            let candidate =
                build_candidate(&rule, &mutation, Utc::now(), self.config.testing_period_days)?;
            self.stores.candidates.insert(candidate.clone())?;

            mutation.status = MutationStatus::Testing;
            if let Err(e) = self.stores.mutations.update(mutation.clone()) {
                let _ = self.stores.candidates.remove(&candidate.id);
                return Err(e);
            }

            self.record(
                &rule.key,
                HistoryEventType::Mutated,
                serde_json::json!({
                    "action": "applied",
                    "mutation_id": mutation.id,
                    "type": mutation.mutation_type(),
                    "candidate_id": candidate.id,
                }),
            );
            info!(
                rule_id = %rule.key,
                mutation_id = %mutation.id,
                candidate_id = %candidate.id,
                "mutation applied"
            );
            Ok(candidate)
        })
    }

    /// Register an operator-built candidate.
    ///
    /// Without a `parent` the candidate can be tested against any rule but can
    /// never be promoted.
    pub fn submit_candidate(
        &self,
        parent: Option<RuleKey>,
        conditions: Vec<RuleCondition>,
        actions: Vec<RuleAction>,
        hypothesis: impl Into<String>,
    ) -> Result<RuleCandidate> {
        for condition in &conditions {
            condition.validate()?;
        }
        if let Some(key) = &parent {
            self.require_rule(key)?;
        }

        let now = Utc::now();
        let candidate = RuleCandidate {
            id: Uuid::new_v4(),
            parent,
            mutation_id: None,
            conditions,
            actions,
            hypothesis: hypothesis.into(),
            expected_improvement: EXPECTED_IMPROVEMENT,
            test_period: TestPeriod::starting_at(now, self.config.testing_period_days)?,
            test_results: None,
            created_at: now,
        };
        self.stores.candidates.insert(candidate.clone())?;

        if let Some(key) = &candidate.parent {
            self.record(
                key,
                HistoryEventType::Mutated,
                serde_json::json!({ "action": "submitted", "candidate_id": candidate.id }),
            );
        }
        debug!(candidate_id = %candidate.id, "candidate submitted");
        Ok(candidate)
    }

    /// Drop a candidate that lost or tied its test, rejecting its mutation.
    ///
    /// Fails with `InvalidState` while a test on the candidate is running.
    pub fn discard_candidate(&self, candidate_id: &Uuid) -> Result<()> {
        let candidate = self.require_candidate(candidate_id)?;
        let family = candidate
            .parent
            .as_ref()
            .map(|k| k.family.clone())
            .unwrap_or_default();

        self.locks.with_family(&family, || {
            let candidate = self.require_candidate(candidate_id)?;
            if self
                .stores
                .tests
                .list()
                .iter()
                .any(|t| t.candidate_id == candidate.id && t.is_running())
            {
                return Err(EvolutionError::InvalidState(format!(
                    "candidate {} still has a running test",
                    candidate.id
                )));
            }

            self.stores.candidates.remove(&candidate.id)?;
            if let Some(mutation_id) = &candidate.mutation_id {
                self.advance_mutation(mutation_id, MutationStatus::Rejected)?;
            }
            if let Some(key) = &candidate.parent {
                self.record(
                    key,
                    HistoryEventType::Mutated,
                    serde_json::json!({
                        "action": "rejected",
                        "candidate_id": candidate.id,
                        "mutation_id": candidate.mutation_id,
                    }),
                );
            }
            info!(candidate_id = %candidate.id, "candidate discarded");
            Ok(())
        })
    }
}
