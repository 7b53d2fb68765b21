//! Tests for the in-memory repositories and lineage locks.

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use uuid::Uuid;

use super::*;
use crate::model::{
    ConditionRef, HistoryEventType, MutationChange, RuleCandidate, RuleMutation, RuleStatus,
    TestPeriod,
};

fn rule(family: &str, version: u32) -> EvolvableRule {
    EvolvableRule::new(
        RuleKey::new(family, version),
        format!("{} rule", family),
        "underbilling",
        vec![],
        vec![],
    )
}

fn candidate() -> RuleCandidate {
    RuleCandidate {
        id: Uuid::new_v4(),
        parent: Some(RuleKey::initial("underbilling")),
        mutation_id: None,
        conditions: vec![],
        actions: vec![],
        hypothesis: "test".to_string(),
        expected_improvement: 0.05,
        test_period: TestPeriod::starting_at(Utc::now(), 14).unwrap(),
        test_results: None,
        created_at: Utc::now(),
    }
}

// ── Rules ───────────────────────────────────────────────────────────

#[test]
fn rule_insert_rejects_duplicate_key() {
    let repo = InMemoryRuleRepository::new();
    repo.insert(rule("underbilling", 1)).unwrap();
    let err = repo.insert(rule("underbilling", 1)).unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(repo.list().len(), 1);
}

#[test]
fn rule_list_is_ordered_by_key() {
    let repo = InMemoryRuleRepository::new();
    repo.insert(rule("zeta", 1)).unwrap();
    repo.insert(rule("alpha", 2)).unwrap();
    repo.insert(rule("alpha", 1)).unwrap();
    let keys: Vec<String> = repo.list().iter().map(|r| r.key.to_string()).collect();
    assert_eq!(keys, vec!["alpha-v1", "alpha-v2", "zeta-v1"]);
}

#[test]
fn update_performance_leaves_status_alone() {
    let repo = InMemoryRuleRepository::new();
    let mut r = rule("underbilling", 1);
    r.status = RuleStatus::Deprecated;
    repo.insert(r).unwrap();

    let mut perf = RulePerformance::default();
    perf.f1_score = 0.4;
    repo.update_performance(&RuleKey::initial("underbilling"), perf)
        .unwrap();

    let stored = repo.get(&RuleKey::initial("underbilling")).unwrap();
    assert_eq!(stored.performance.f1_score, 0.4);
    assert_eq!(stored.status, RuleStatus::Deprecated);
}

#[test]
fn update_unknown_rule_is_not_found() {
    let repo = InMemoryRuleRepository::new();
    let err = repo
        .set_status(&RuleKey::initial("ghost"), RuleStatus::Deprecated)
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn supersede_flips_parent_and_installs_successor() {
    let repo = InMemoryRuleRepository::new();
    repo.insert(rule("underbilling", 1)).unwrap();

    repo.supersede(&RuleKey::new("underbilling", 1), rule("underbilling", 2))
        .unwrap();

    let all = repo.list();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].status, RuleStatus::Deprecated);
    assert_eq!(all[1].status, RuleStatus::Active);
}

#[test]
fn supersede_with_missing_parent_changes_nothing() {
    let repo = InMemoryRuleRepository::new();
    let err = repo
        .supersede(&RuleKey::new("underbilling", 1), rule("underbilling", 2))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(repo.list().is_empty());
}

#[test]
fn supersede_onto_existing_successor_changes_nothing() {
    let repo = InMemoryRuleRepository::new();
    repo.insert(rule("underbilling", 1)).unwrap();
    repo.insert(rule("underbilling", 2)).unwrap();
    let err = repo
        .supersede(&RuleKey::new("underbilling", 1), rule("underbilling", 2))
        .unwrap_err();
    assert!(err.is_invalid_state());
    assert!(repo.list().iter().all(|r| r.status == RuleStatus::Active));
}

// ── Mutations / candidates / tests ──────────────────────────────────

#[test]
fn mutations_list_in_insertion_order() {
    let repo = InMemoryMutationRepository::new();
    let first = RuleMutation::proposed(
        RuleKey::initial("underbilling"),
        MutationChange::ConditionRemove {
            conditions: vec![ConditionRef::new(0, "a")],
        },
        "first",
    );
    let second = RuleMutation::proposed(
        RuleKey::initial("underbilling"),
        MutationChange::ConditionRemove {
            conditions: vec![ConditionRef::new(0, "b")],
        },
        "second",
    );
    repo.insert(first.clone()).unwrap();
    repo.insert(second.clone()).unwrap();

    let listed = repo.list();
    assert_eq!(listed[0].id, first.id);
    assert_eq!(listed[1].id, second.id);
}

#[test]
fn mutation_update_requires_existing_record() {
    let repo = InMemoryMutationRepository::new();
    let m = RuleMutation::proposed(
        RuleKey::initial("underbilling"),
        MutationChange::ConditionRemove { conditions: vec![] },
        "h",
    );
    assert!(repo.update(m).unwrap_err().is_not_found());
}

#[test]
fn candidate_remove_returns_record_once() {
    let repo = InMemoryCandidateRepository::new();
    let c = candidate();
    repo.insert(c.clone()).unwrap();

    let removed = repo.remove(&c.id).unwrap();
    assert_eq!(removed.id, c.id);
    assert!(repo.get(&c.id).is_none());
    assert!(repo.remove(&c.id).unwrap_err().is_not_found());
}

#[test]
fn test_repository_round_trip() {
    let repo = InMemoryTestRepository::new();
    assert!(repo.get(&Uuid::new_v4()).is_none());
    assert!(repo.list().is_empty());
}

// ── History ─────────────────────────────────────────────────────────

#[test]
fn history_is_per_rule_and_ordered() {
    let ledger = InMemoryHistoryLedger::new();
    let v1 = RuleKey::new("underbilling", 1);
    let v2 = RuleKey::new("underbilling", 2);

    ledger.append(&v1, HistoryEvent::now(HistoryEventType::Created, serde_json::json!({})));
    ledger.append(&v1, HistoryEvent::now(HistoryEventType::Deprecated, serde_json::json!({})));
    ledger.append(&v2, HistoryEvent::now(HistoryEventType::Promoted, serde_json::json!({})));

    let events = ledger.events(&v1);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, HistoryEventType::Created);
    assert_eq!(events[1].event_type, HistoryEventType::Deprecated);
    assert_eq!(ledger.events(&v2).len(), 1);
    assert!(ledger.events(&RuleKey::initial("ghost")).is_empty());
}

// ── Lineage locks ───────────────────────────────────────────────────

#[test]
fn same_family_shares_one_lock() {
    let locks = LineageLocks::new();
    let a = locks.handle("underbilling");
    let b = locks.handle("underbilling");
    let c = locks.handle("missed_renewal");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(locks.len(), 2);
}

#[test]
fn with_family_serializes_writers() {
    let locks = Arc::new(LineageLocks::new());
    let counter = Arc::new(std::sync::Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                locks.with_family("underbilling", || {
                    let mut seen = counter.lock().unwrap();
                    seen.push(i);
                })
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(counter.lock().unwrap().len(), 8);
}
