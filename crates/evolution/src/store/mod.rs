//! Repository contracts the engine is constructed with.
//!
//! Each repository owns one entity type. The engine only talks to these
//! traits, so tests can substitute fakes and production can swap in a
//! persistent backing store without touching the algorithms.
//!
//! Implementations must make the multi-field transitions explicit:
//! - `RuleRepository::supersede` deprecates the parent and installs its
//!   successor as one atomic write, so no reader observes two active
//!   versions of a lineage.
//! - `HistoryLedger` is append-only; entries are never rewritten or dropped.

mod lineage;
mod memory;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    EvolvableRule, HistoryEvent, RuleCandidate, RuleKey, RuleMutation, RulePerformance,
    RuleStatus, RuleTest,
};

pub use lineage::LineageLocks;
pub use memory::{
    InMemoryCandidateRepository, InMemoryHistoryLedger, InMemoryMutationRepository,
    InMemoryRuleRepository, InMemoryTestRepository,
};

/// Storage for every rule version, deprecated ones included.
pub trait RuleRepository: Send + Sync {
    /// Store a new version. Fails with `InvalidState` if the key exists.
    fn insert(&self, rule: EvolvableRule) -> Result<()>;

    fn get(&self, key: &RuleKey) -> Option<EvolvableRule>;

    /// All versions, ordered by key.
    fn list(&self) -> Vec<EvolvableRule>;

    /// Replace only the performance block (and `last_modified`).
    fn update_performance(&self, key: &RuleKey, performance: RulePerformance) -> Result<()>;

    fn set_status(&self, key: &RuleKey, status: RuleStatus) -> Result<()>;

    /// Atomically deprecate `parent` and insert `successor`.
    fn supersede(&self, parent: &RuleKey, successor: EvolvableRule) -> Result<()>;
}

pub trait MutationRepository: Send + Sync {
    fn insert(&self, mutation: RuleMutation) -> Result<()>;
    fn get(&self, id: &Uuid) -> Option<RuleMutation>;
    fn update(&self, mutation: RuleMutation) -> Result<()>;
    /// All mutations in insertion order.
    fn list(&self) -> Vec<RuleMutation>;
}

pub trait CandidateRepository: Send + Sync {
    fn insert(&self, candidate: RuleCandidate) -> Result<()>;
    fn get(&self, id: &Uuid) -> Option<RuleCandidate>;
    fn update(&self, candidate: RuleCandidate) -> Result<()>;
    /// Delete and return the candidate.
    fn remove(&self, id: &Uuid) -> Result<RuleCandidate>;
    fn list(&self) -> Vec<RuleCandidate>;
}

pub trait TestRepository: Send + Sync {
    fn insert(&self, test: RuleTest) -> Result<()>;
    fn get(&self, id: &Uuid) -> Option<RuleTest>;
    fn update(&self, test: RuleTest) -> Result<()>;
    /// All tests in insertion order.
    fn list(&self) -> Vec<RuleTest>;
}

/// Per-rule append-only audit trail.
pub trait HistoryLedger: Send + Sync {
    fn append(&self, rule: &RuleKey, event: HistoryEvent);
    /// Events for a rule, oldest first. Unknown rules have an empty history.
    fn events(&self, rule: &RuleKey) -> Vec<HistoryEvent>;
}

/// The set of repositories an engine is constructed with.
#[derive(Clone)]
pub struct EngineStores {
    pub rules: Arc<dyn RuleRepository>,
    pub mutations: Arc<dyn MutationRepository>,
    pub candidates: Arc<dyn CandidateRepository>,
    pub tests: Arc<dyn TestRepository>,
    pub history: Arc<dyn HistoryLedger>,
}

impl EngineStores {
    /// Fresh, empty in-memory repositories.
    pub fn in_memory() -> Self {
        Self {
            rules: Arc::new(InMemoryRuleRepository::new()),
            mutations: Arc::new(InMemoryMutationRepository::new()),
            candidates: Arc::new(InMemoryCandidateRepository::new()),
            tests: Arc::new(InMemoryTestRepository::new()),
            history: Arc::new(InMemoryHistoryLedger::new()),
        }
    }
}

impl Default for EngineStores {
    fn default() -> Self {
        Self::in_memory()
    }
}
