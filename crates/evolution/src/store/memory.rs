//! In-memory repositories backed by `std::sync::RwLock` maps.
//!
//! Usable from both async handlers and synchronous compute threads. Every
//! lock is held only for the clone or write, never across caller code.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::Utc;
use indexmap::IndexMap;
use uuid::Uuid;

use super::{
    CandidateRepository, HistoryLedger, MutationRepository, RuleRepository, TestRepository,
};
use crate::error::{EntityKind, EvolutionError, Result};
use crate::model::{
    EvolvableRule, HistoryEvent, RuleCandidate, RuleKey, RuleMutation, RulePerformance,
    RuleStatus, RuleTest,
};

// ── Rules ───────────────────────────────────────────────────────────

/// Rule versions keyed by [`RuleKey`]; a `BTreeMap` keeps listing order stable.
pub struct InMemoryRuleRepository {
    rules: RwLock<BTreeMap<RuleKey, EvolvableRule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryRuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn insert(&self, rule: EvolvableRule) -> Result<()> {
        let mut guard = self.rules.write().expect("rules lock poisoned");
        if guard.contains_key(&rule.key) {
            return Err(EvolutionError::InvalidState(format!(
                "rule {} already exists",
                rule.key
            )));
        }
        guard.insert(rule.key.clone(), rule);
        Ok(())
    }

    fn get(&self, key: &RuleKey) -> Option<EvolvableRule> {
        self.rules
            .read()
            .expect("rules lock poisoned")
            .get(key)
            .cloned()
    }

    fn list(&self) -> Vec<EvolvableRule> {
        self.rules
            .read()
            .expect("rules lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn update_performance(&self, key: &RuleKey, performance: RulePerformance) -> Result<()> {
        let mut guard = self.rules.write().expect("rules lock poisoned");
        let rule = guard
            .get_mut(key)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Rule, key))?;
        rule.performance = performance;
        rule.last_modified = Utc::now();
        Ok(())
    }

    fn set_status(&self, key: &RuleKey, status: RuleStatus) -> Result<()> {
        let mut guard = self.rules.write().expect("rules lock poisoned");
        let rule = guard
            .get_mut(key)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Rule, key))?;
        rule.status = status;
        rule.last_modified = Utc::now();
        Ok(())
    }

    fn supersede(&self, parent: &RuleKey, successor: EvolvableRule) -> Result<()> {
        let mut guard = self.rules.write().expect("rules lock poisoned");
        if guard.contains_key(&successor.key) {
            return Err(EvolutionError::InvalidState(format!(
                "rule {} already exists",
                successor.key
            )));
        }
        let old = guard
            .get_mut(parent)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Rule, parent))?;
        old.status = RuleStatus::Deprecated;
        old.last_modified = Utc::now();
        guard.insert(successor.key.clone(), successor);
        Ok(())
    }
}

// ── Mutations ───────────────────────────────────────────────────────

pub struct InMemoryMutationRepository {
    mutations: RwLock<IndexMap<Uuid, RuleMutation>>,
}

impl InMemoryMutationRepository {
    pub fn new() -> Self {
        Self {
            mutations: RwLock::new(IndexMap::new()),
        }
    }
}

impl Default for InMemoryMutationRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationRepository for InMemoryMutationRepository {
    fn insert(&self, mutation: RuleMutation) -> Result<()> {
        let mut guard = self.mutations.write().expect("mutations lock poisoned");
        if guard.contains_key(&mutation.id) {
            return Err(EvolutionError::InvalidState(format!(
                "mutation {} already exists",
                mutation.id
            )));
        }
        guard.insert(mutation.id, mutation);
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Option<RuleMutation> {
        self.mutations
            .read()
            .expect("mutations lock poisoned")
            .get(id)
            .cloned()
    }

    fn update(&self, mutation: RuleMutation) -> Result<()> {
        let mut guard = self.mutations.write().expect("mutations lock poisoned");
        match guard.get_mut(&mutation.id) {
            Some(slot) => {
                *slot = mutation;
                Ok(())
            }
            None => Err(EvolutionError::not_found(EntityKind::Mutation, mutation.id)),
        }
    }

    fn list(&self) -> Vec<RuleMutation> {
        self.mutations
            .read()
            .expect("mutations lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

// ── Candidates ──────────────────────────────────────────────────────

pub struct InMemoryCandidateRepository {
    candidates: RwLock<IndexMap<Uuid, RuleCandidate>>,
}

impl InMemoryCandidateRepository {
    pub fn new() -> Self {
        Self {
            candidates: RwLock::new(IndexMap::new()),
        }
    }
}

impl Default for InMemoryCandidateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateRepository for InMemoryCandidateRepository {
    fn insert(&self, candidate: RuleCandidate) -> Result<()> {
        let mut guard = self.candidates.write().expect("candidates lock poisoned");
        if guard.contains_key(&candidate.id) {
            return Err(EvolutionError::InvalidState(format!(
                "candidate {} already exists",
                candidate.id
            )));
        }
        guard.insert(candidate.id, candidate);
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Option<RuleCandidate> {
        self.candidates
            .read()
            .expect("candidates lock poisoned")
            .get(id)
            .cloned()
    }

    fn update(&self, candidate: RuleCandidate) -> Result<()> {
        let mut guard = self.candidates.write().expect("candidates lock poisoned");
        match guard.get_mut(&candidate.id) {
            Some(slot) => {
                *slot = candidate;
                Ok(())
            }
            None => Err(EvolutionError::not_found(EntityKind::Candidate, candidate.id)),
        }
    }

    fn remove(&self, id: &Uuid) -> Result<RuleCandidate> {
        self.candidates
            .write()
            .expect("candidates lock poisoned")
            .shift_remove(id)
            .ok_or_else(|| EvolutionError::not_found(EntityKind::Candidate, id))
    }

    fn list(&self) -> Vec<RuleCandidate> {
        self.candidates
            .read()
            .expect("candidates lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

pub struct InMemoryTestRepository {
    tests: RwLock<IndexMap<Uuid, RuleTest>>,
}

impl InMemoryTestRepository {
    pub fn new() -> Self {
        Self {
            tests: RwLock::new(IndexMap::new()),
        }
    }
}

impl Default for InMemoryTestRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRepository for InMemoryTestRepository {
    fn insert(&self, test: RuleTest) -> Result<()> {
        let mut guard = self.tests.write().expect("tests lock poisoned");
        if guard.contains_key(&test.id) {
            return Err(EvolutionError::InvalidState(format!(
                "test {} already exists",
                test.id
            )));
        }
        guard.insert(test.id, test);
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Option<RuleTest> {
        self.tests
            .read()
            .expect("tests lock poisoned")
            .get(id)
            .cloned()
    }

    fn update(&self, test: RuleTest) -> Result<()> {
        let mut guard = self.tests.write().expect("tests lock poisoned");
        match guard.get_mut(&test.id) {
            Some(slot) => {
                *slot = test;
                Ok(())
            }
            None => Err(EvolutionError::not_found(EntityKind::Test, test.id)),
        }
    }

    fn list(&self) -> Vec<RuleTest> {
        self.tests
            .read()
            .expect("tests lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

// ── History ─────────────────────────────────────────────────────────

/// Unbounded per-rule event log. Unlike a rolling audit buffer, nothing is
/// ever evicted.
pub struct InMemoryHistoryLedger {
    entries: RwLock<HashMap<RuleKey, Vec<HistoryEvent>>>,
}

impl InMemoryHistoryLedger {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryHistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLedger for InMemoryHistoryLedger {
    fn append(&self, rule: &RuleKey, event: HistoryEvent) {
        self.entries
            .write()
            .expect("history lock poisoned")
            .entry(rule.clone())
            .or_default()
            .push(event);
    }

    fn events(&self, rule: &RuleKey) -> Vec<HistoryEvent> {
        self.entries
            .read()
            .expect("history lock poisoned")
            .get(rule)
            .cloned()
            .unwrap_or_default()
    }
}
