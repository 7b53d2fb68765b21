//! Promotion manager: installs a winning candidate as the next rule version.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::EvolutionEngine;
use crate::error::{EvolutionError, Result};
use crate::model::{
    EvolvableRule, HistoryEventType, MutationStatus, RuleCandidate, RuleStatus, TestStatus,
    TestWinner,
};

/// The rule version a candidate turns into when promoted over `parent`. Pure.
///
/// Performance is seeded from the candidate's test results, falling back to
/// the parent's running metrics when the candidate was never tested. Fails
/// with `InvalidState` when the lineage has run out of version numbers.
pub fn successor_rule(parent: &EvolvableRule, candidate: &RuleCandidate) -> Result<EvolvableRule> {
    let key = parent.key.successor().ok_or_else(|| {
        EvolutionError::InvalidState(format!(
            "rule {} is the last representable version of its lineage",
            parent.key
        ))
    })?;
    let now = Utc::now();
    Ok(EvolvableRule {
        key,
        name: parent.name.clone(),
        leak_type: parent.leak_type.clone(),
        conditions: candidate.conditions.clone(),
        actions: candidate.actions.clone(),
        performance: candidate
            .test_results
            .clone()
            .unwrap_or_else(|| parent.performance.clone()),
        status: RuleStatus::Active,
        parent: Some(parent.key.clone()),
        created_at: now,
        last_modified: now,
    })
}

impl EvolutionEngine {
    /// Promote a candidate into a new version of its parent's lineage.
    ///
    /// The parent is deprecated and the successor installed in one repository
    /// write. The candidate is deleted and its mutation marked adopted.
    ///
    /// Fails with `InvalidState` when the candidate has no parent link, the
    /// parent is no longer active, a test on the candidate is still running,
    /// or its latest completed test was not won by the candidate.
    pub fn promote_candidate(&self, candidate_id: &Uuid) -> Result<EvolvableRule> {
        let candidate = self.require_candidate(candidate_id)?;
        let parent_key = candidate.parent.clone().ok_or_else(|| {
            EvolutionError::InvalidState(format!(
                "candidate {} has no parent rule and cannot be promoted",
                candidate.id
            ))
        })?;

        self.locks.with_family(&parent_key.family, || {
            let candidate = self.require_candidate(candidate_id)?;
            let parent = self.require_rule(&parent_key)?;
            if !parent.is_active() {
                return Err(EvolutionError::InvalidState(format!(
                    "parent {} is {}, only active rules can be superseded",
                    parent.key, parent.status
                )));
            }
            self.check_test_verdict(&candidate)?;

            let successor = successor_rule(&parent, &candidate)?;
            self.stores
                .rules
                .supersede(&parent.key, successor.clone())?;
            self.stores.candidates.remove(&candidate.id)?;
            if let Some(mutation_id) = &candidate.mutation_id {
                self.advance_mutation(mutation_id, MutationStatus::Adopted)?;
            }
            let withdrawn = self.reject_pending_mutations(&parent.key)?;

            self.record(
                &parent.key,
                HistoryEventType::Deprecated,
                serde_json::json!({
                    "reason": "superseded",
                    "successor": successor.key.to_string(),
                    "withdrawn_mutations": withdrawn,
                }),
            );
            self.record(
                &successor.key,
                HistoryEventType::Promoted,
                serde_json::json!({
                    "parent": parent.key.to_string(),
                    "candidate_id": candidate.id,
                    "mutation_id": candidate.mutation_id,
                    "hypothesis": candidate.hypothesis,
                    "f1_score": successor.performance.f1_score,
                }),
            );
            info!(
                rule_id = %successor.key,
                parent = %parent.key,
                candidate_id = %candidate.id,
                "candidate promoted"
            );
            Ok(successor)
        })
    }

    /// Untested candidates may be promoted by an operator; tested ones only
    /// after a candidate win.
    fn check_test_verdict(&self, candidate: &RuleCandidate) -> Result<()> {
        let tests: Vec<_> = self
            .stores
            .tests
            .list()
            .into_iter()
            .filter(|t| t.candidate_id == candidate.id)
            .collect();

        if tests.iter().any(|t| t.is_running()) {
            return Err(EvolutionError::InvalidState(format!(
                "candidate {} still has a running test",
                candidate.id
            )));
        }
        let latest_verdict = tests
            .iter()
            .filter(|t| t.status == TestStatus::Completed)
            .max_by_key(|t| t.completed_at)
            .and_then(|t| t.winner);
        match latest_verdict {
            None | Some(TestWinner::Candidate) => Ok(()),
            Some(winner) => Err(EvolutionError::InvalidState(format!(
                "candidate {} did not win its test (winner: {})",
                candidate.id, winner
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RuleKey, RulePerformance, TestPeriod};

    fn parent() -> EvolvableRule {
        let mut rule = EvolvableRule::new(
            RuleKey::initial("underbilling"),
            "Underbilling",
            "underbilling",
            vec![],
            vec![],
        );
        rule.performance.f1_score = 0.6;
        rule
    }

    fn candidate(results: Option<RulePerformance>) -> RuleCandidate {
        RuleCandidate {
            id: Uuid::new_v4(),
            parent: Some(RuleKey::initial("underbilling")),
            mutation_id: None,
            conditions: vec![],
            actions: vec![],
            hypothesis: "h".into(),
            expected_improvement: 0.05,
            test_period: TestPeriod::starting_at(Utc::now(), 14).unwrap(),
            test_results: results,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn successor_bumps_version_and_links_parent() {
        let next = successor_rule(&parent(), &candidate(None)).unwrap();
        assert_eq!(next.key, RuleKey::new("underbilling", 2));
        assert_eq!(next.key.to_string(), "underbilling-v2");
        assert_eq!(next.parent, Some(RuleKey::initial("underbilling")));
        assert_eq!(next.status, RuleStatus::Active);
        assert_eq!(next.leak_type, "underbilling");
    }

    #[test]
    fn successor_falls_back_to_parent_performance() {
        let next = successor_rule(&parent(), &candidate(None)).unwrap();
        assert_eq!(next.performance.f1_score, 0.6);

        let tested = RulePerformance {
            f1_score: 0.9,
            ..Default::default()
        };
        let next = successor_rule(&parent(), &candidate(Some(tested))).unwrap();
        assert_eq!(next.performance.f1_score, 0.9);
    }

    #[test]
    fn exhausted_lineage_has_no_successor() {
        let mut last = parent();
        last.key = RuleKey::new("underbilling", u32::MAX);
        let err = successor_rule(&last, &candidate(None)).unwrap_err();
        assert!(err.is_invalid_state());
    }
}
