//! A/B test controller: compares a candidate against its parent's live
//! performance.
//!
//! State machine: `running → completed` or `running → cancelled`. The test
//! window is advisory; nothing completes a test automatically when
//! `test_period.end` passes.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::EvolutionEngine;
use crate::error::{EvolutionError, Result};
use crate::model::{
    HistoryEventType, PerformanceUpdate, RuleKey, RulePerformance, RuleTest, TestStatus,
    TestWinner,
};

impl EvolutionEngine {
    /// Start comparing `candidate_id` against the rule `key`.
    ///
    /// The rule's current performance is snapshotted as the control; the
    /// candidate's results start from zero.
    pub fn start_test(&self, key: &RuleKey, candidate_id: &Uuid) -> Result<RuleTest> {
        self.locks.with_family(&key.family, || {
            let rule = self.require_rule(key)?;
            let candidate = self.require_candidate(candidate_id)?;

            if let Some(parent) = &candidate.parent {
                if parent != key {
                    return Err(EvolutionError::InvalidState(format!(
                        "candidate {} belongs to {}, not {}",
                        candidate.id, parent, key
                    )));
                }
            }
            if self
                .stores
                .tests
                .list()
                .iter()
                .any(|t| t.candidate_id == candidate.id && t.is_running())
            {
                return Err(EvolutionError::InvalidState(format!(
                    "candidate {} already has a running test",
                    candidate.id
                )));
            }

            let test = RuleTest {
                id: Uuid::new_v4(),
                rule: key.clone(),
                candidate_id: candidate.id,
                status: TestStatus::Running,
                control_results: rule.performance.clone(),
                test_results: RulePerformance::default(),
                winner: None,
                started_at: Utc::now(),
                completed_at: None,
            };
            self.stores.tests.insert(test.clone())?;

            self.record(
                key,
                HistoryEventType::Tested,
                serde_json::json!({
                    "action": "started",
                    "test_id": test.id,
                    "candidate_id": candidate.id,
                    "control_f1": test.control_results.f1_score,
                    "ends_at": candidate.test_period.end,
                }),
            );
            info!(rule_id = %key, test_id = %test.id, candidate_id = %candidate.id, "A/B test started");
            Ok(test)
        })
    }

    /// Fold one scored outcome's metrics into a running test.
    ///
    /// Metrics present in `update` overwrite the running values and the
    /// application counter goes up by one.
    pub fn record_test_results(&self, test_id: &Uuid, update: PerformanceUpdate) -> Result<RuleTest> {
        update.validate()?;
        let family = self.require_test(test_id)?.rule.family;

        self.locks.with_family(&family, || {
            let mut test = self.require_test(test_id)?;
            if !test.is_running() {
                return Err(EvolutionError::InvalidState(format!(
                    "test {} is {}, cannot record results",
                    test.id, test.status
                )));
            }
            test.test_results.apply_update(&update);
            self.stores.tests.update(test.clone())?;
            debug!(
                test_id = %test.id,
                applications = test.test_results.total_applications,
                "test results recorded"
            );
            Ok(test)
        })
    }

    /// Close a running test and decide its winner.
    ///
    /// The candidate wins when its F1 beats the control by more than
    /// [`crate::model::IMPROVEMENT_THRESHOLD`], the control wins on the
    /// mirror condition, anything else is a tie. The winner is never changed
    /// afterwards.
    pub fn complete_test(&self, test_id: &Uuid) -> Result<RuleTest> {
        let family = self.require_test(test_id)?.rule.family;

        self.locks.with_family(&family, || {
            let mut test = self.require_test(test_id)?;
            if !test.is_running() {
                return Err(EvolutionError::InvalidState(format!(
                    "test {} is {}, only running tests can complete",
                    test.id, test.status
                )));
            }

            let winner = TestWinner::decide(
                test.control_results.f1_score,
                test.test_results.f1_score,
            );
            test.winner = Some(winner);
            test.status = TestStatus::Completed;
            test.completed_at = Some(Utc::now());
            self.stores.tests.update(test.clone())?;

            if let Some(mut candidate) = self.stores.candidates.get(&test.candidate_id) {
                candidate.test_results = Some(test.test_results.clone());
                self.stores.candidates.update(candidate)?;
            }

            self.record(
                &test.rule,
                HistoryEventType::Tested,
                serde_json::json!({
                    "action": "completed",
                    "test_id": test.id,
                    "candidate_id": test.candidate_id,
                    "winner": winner,
                    "control_f1": test.control_results.f1_score,
                    "candidate_f1": test.test_results.f1_score,
                    "delta": test.f1_delta(),
                }),
            );
            info!(
                rule_id = %test.rule,
                test_id = %test.id,
                winner = %winner,
                delta = test.f1_delta(),
                "A/B test completed"
            );
            Ok(test)
        })
    }

    /// Abandon a running test without a verdict.
    pub fn cancel_test(&self, test_id: &Uuid) -> Result<RuleTest> {
        let family = self.require_test(test_id)?.rule.family;

        self.locks.with_family(&family, || {
            let mut test = self.require_test(test_id)?;
            if !test.is_running() {
                return Err(EvolutionError::InvalidState(format!(
                    "test {} is {}, only running tests can be cancelled",
                    test.id, test.status
                )));
            }
            test.status = TestStatus::Cancelled;
            test.completed_at = Some(Utc::now());
            self.stores.tests.update(test.clone())?;

            self.record(
                &test.rule,
                HistoryEventType::Tested,
                serde_json::json!({ "action": "cancelled", "test_id": test.id }),
            );
            info!(rule_id = %test.rule, test_id = %test.id, "A/B test cancelled");
            Ok(test)
        })
    }
}
