//! [`EvolutionEngine`]: the single owner of rule, mutation, candidate, test
//! and history state.
//!
//! The engine is split across modules by lifecycle stage:
//! - [`crate::generator`]: proposing mutations
//! - [`crate::candidate`]: materializing and discarding candidates
//! - [`crate::ab_test`]: running control-vs-candidate comparisons
//! - [`crate::promotion`]: installing winning candidates as new versions
//! - [`crate::evaluator`]: scoring active rules against outcome batches
//! - [`crate::auto_evolve`]: the periodic evolution loop
//!
//! This module holds construction, the rule store operations and the read
//! accessors.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use leakwatch_core::EvolutionConfig;

use crate::error::{EntityKind, EvolutionError, Result};
use crate::model::{
    EvolvableRule, HistoryEvent, HistoryEventType, MutationStatus, RuleCandidate, RuleKey,
    RuleMutation, RuleStatus, RuleTest, TestStatus,
};
use crate::store::{EngineStores, LineageLocks};


/// Manages a population of versioned rules and drives their evolution.
///
/// All methods take `&self`; share the engine behind an `Arc` to reach it
/// from detection batches and operator calls concurrently. Transitions that
/// touch more than one record are serialized per rule family.
pub struct EvolutionEngine {
    pub(crate) config: EvolutionConfig,
    pub(crate) stores: EngineStores,
    pub(crate) locks: LineageLocks,
    pub(crate) rng: Mutex<Box<dyn RngCore + Send>>,
}

impl EvolutionEngine {
    /// Engine over fresh in-memory repositories with an entropy-seeded RNG.
    pub fn new(config: EvolutionConfig) -> Self {
        Self::with_stores(config, EngineStores::in_memory())
    }

    /// Engine over caller-supplied repositories.
    pub fn with_stores(config: EvolutionConfig, stores: EngineStores) -> Self {
        Self {
            config,
            stores,
            locks: LineageLocks::new(),
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Replace the random source used by the auto-evolution loop.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    // ── Rule store ──────────────────────────────────────────────────

    /// Register a rule version.
    ///
    /// Fails with `InvalidState` if the key already exists, or if the rule is
    /// active while its family already has an active version.
    pub fn add_rule(&self, rule: EvolvableRule) -> Result<()> {
        rule.validate()?;
        let key = rule.key.clone();
        self.locks.with_family(&key.family, || {
            if rule.is_active() {
                if let Some(active) = self.active_in_family(&key.family) {
                    return Err(EvolutionError::InvalidState(format!(
                        "family '{}' already has active version {}",
                        key.family, active.key
                    )));
                }
            }
            let details = serde_json::json!({
                "name": rule.name,
                "leak_type": rule.leak_type,
                "status": rule.status,
                "conditions": rule.conditions.len(),
                "actions": rule.actions.len(),
                "parent": rule.parent.as_ref().map(ToString::to_string),
            });
            self.stores.rules.insert(rule)?;
            self.record(&key, HistoryEventType::Created, details);
            info!(rule_id = %key, "rule added");
            Ok(())
        })
    }

    /// Retire a rule version. Deprecated versions are kept for audit and
    /// never reactivated.
    pub fn deprecate_rule(&self, key: &RuleKey) -> Result<()> {
        self.locks.with_family(&key.family, || {
            let rule = self.require_rule(key)?;
            if rule.status == RuleStatus::Deprecated {
                return Err(EvolutionError::InvalidState(format!(
                    "rule {} is already deprecated",
                    key
                )));
            }
            self.stores.rules.set_status(key, RuleStatus::Deprecated)?;
            self.record(
                key,
                HistoryEventType::Deprecated,
                serde_json::json!({ "reason": "retired", "previous_status": rule.status }),
            );
            info!(rule_id = %key, "rule deprecated");
            Ok(())
        })
    }

    // ── Read accessors ──────────────────────────────────────────────

    pub fn get_rule(&self, key: &RuleKey) -> Option<EvolvableRule> {
        self.stores.rules.get(key)
    }

    pub fn get_all_rules(&self) -> Vec<EvolvableRule> {
        self.stores.rules.list()
    }

    pub fn get_active_rules(&self) -> Vec<EvolvableRule> {
        self.stores
            .rules
            .list()
            .into_iter()
            .filter(EvolvableRule::is_active)
            .collect()
    }

    /// Lifecycle events for one rule version, oldest first.
    pub fn get_rule_history(&self, key: &RuleKey) -> Vec<HistoryEvent> {
        self.stores.history.events(key)
    }

    /// Mutations still awaiting application.
    pub fn get_pending_mutations(&self) -> Vec<RuleMutation> {
        self.stores
            .mutations
            .list()
            .into_iter()
            .filter(|m| m.status == MutationStatus::Proposed)
            .collect()
    }

    pub fn get_mutation(&self, id: &Uuid) -> Option<RuleMutation> {
        self.stores.mutations.get(id)
    }

    pub fn get_candidate(&self, id: &Uuid) -> Option<RuleCandidate> {
        self.stores.candidates.get(id)
    }

    pub fn get_candidates(&self) -> Vec<RuleCandidate> {
        self.stores.candidates.list()
    }

    pub fn get_test(&self, id: &Uuid) -> Option<RuleTest> {
        self.stores.tests.get(id)
    }

    /// Tests still inside their window.
    pub fn get_active_tests(&self) -> Vec<RuleTest> {
        self.stores
            .tests
            .list()
            .into_iter()
            .filter(RuleTest::is_running)
            .collect()
    }

    pub fn get_stats(&self) -> EvolutionStats {
        let rules = self.stores.rules.list();
        let tests = self.stores.tests.list();

        let count = |status: RuleStatus| rules.iter().filter(|r| r.status == status).count();
        let active: Vec<&EvolvableRule> = rules.iter().filter(|r| r.is_active()).collect();
        let average_active_f1 = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|r| r.performance.f1_score).sum::<f64>() / active.len() as f64
        };

        EvolutionStats {
            total_rules: rules.len(),
            active_rules: count(RuleStatus::Active),
            testing_rules: count(RuleStatus::Testing),
            deprecated_rules: count(RuleStatus::Deprecated),
            pending_mutations: self.get_pending_mutations().len(),
            candidates: self.stores.candidates.list().len(),
            running_tests: tests.iter().filter(|t| t.status == TestStatus::Running).count(),
            completed_tests: tests
                .iter()
                .filter(|t| t.status == TestStatus::Completed)
                .count(),
            average_active_f1,
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    pub(crate) fn require_rule(&self, key: &RuleKey) -> Result<EvolvableRule> {
        self.stores
            .rules
            .get(key)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Rule, key))
    }

    pub(crate) fn require_mutation(&self, id: &Uuid) -> Result<RuleMutation> {
        self.stores
            .mutations
            .get(id)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Mutation, id))
    }

    pub(crate) fn require_candidate(&self, id: &Uuid) -> Result<RuleCandidate> {
        self.stores
            .candidates
            .get(id)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Candidate, id))
    }

    pub(crate) fn require_test(&self, id: &Uuid) -> Result<RuleTest> {
        self.stores
            .tests
            .get(id)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Test, id))
    }

    pub(crate) fn active_in_family(&self, family: &str) -> Option<EvolvableRule> {
        self.stores
            .rules
            .list()
            .into_iter()
            .find(|r| r.key.family == family && r.is_active())
    }

    /// Move a mutation forward, ignoring moves its status does not allow.
    pub(crate) fn advance_mutation(&self, id: &Uuid, next: MutationStatus) -> Result<bool> {
        let mut mutation = self.require_mutation(id)?;
        if !mutation.status.can_transition_to(next) {
            return Ok(false);
        }
        mutation.status = next;
        self.stores.mutations.update(mutation)?;
        Ok(true)
    }

    /// Whether `key` still has proposals nobody has applied or rejected.
    pub(crate) fn has_pending_mutations(&self, key: &RuleKey) -> bool {
        self.stores
            .mutations
            .list()
            .iter()
            .any(|m| &m.rule == key && m.status == MutationStatus::Proposed)
    }

    /// Reject every still-proposed mutation of `key`. Returns how many moved.
    pub(crate) fn reject_pending_mutations(&self, key: &RuleKey) -> Result<usize> {
        let mut rejected = 0;
        for mutation in self.stores.mutations.list() {
            if &mutation.rule != key || mutation.status != MutationStatus::Proposed {
                continue;
            }
            if self.advance_mutation(&mutation.id, MutationStatus::Rejected)? {
                rejected += 1;
            }
        }
        Ok(rejected)
    }

    pub(crate) fn record(
        &self,
        key: &RuleKey,
        event_type: HistoryEventType,
        details: serde_json::Value,
    ) {
        self.stores
            .history
            .append(key, HistoryEvent::now(event_type, details));
    }
}

/// Population summary for dashboards and worker logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvolutionStats {
    pub total_rules: usize,
    pub active_rules: usize,
    pub testing_rules: usize,
    pub deprecated_rules: usize,
    pub pending_mutations: usize,
    pub candidates: usize,
    pub running_tests: usize,
    pub completed_tests: usize,
    pub average_active_f1: f64,
}
