//! Complete alternate rule bodies pending validation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EvolutionError, Result};

use super::key::RuleKey;
use super::performance::RulePerformance;
use super::rule::{RuleAction, RuleCondition};

/// Advisory wall-clock window for a candidate's A/B test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TestPeriod {
    /// A window of `days` from `start`. Fails with `Validation` when the end
    /// falls outside the representable calendar.
    pub fn starting_at(start: DateTime<Utc>, days: u32) -> Result<Self> {
        let end = Duration::try_days(i64::from(days))
            .and_then(|span| start.checked_add_signed(span))
            .ok_or_else(|| {
                EvolutionError::Validation(format!(
                    "testing period of {} days overflows the calendar",
                    days
                ))
            })?;
        Ok(Self { start, end })
    }

    /// Whether the window has closed. Nothing acts on this automatically.
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

/// A full alternate rule body, not a diff against the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCandidate {
    pub id: Uuid,
    /// Lineage link. Operator-submitted candidates may lack one, which makes
    /// them unpromotable.
    #[serde(default)]
    pub parent: Option<RuleKey>,
    /// Mutation this candidate was built from, if any.
    #[serde(default)]
    pub mutation_id: Option<Uuid>,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub hypothesis: String,
    pub expected_improvement: f64,
    pub test_period: TestPeriod,
    #[serde(default)]
    pub test_results: Option<RulePerformance>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_spans_requested_days() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let period = TestPeriod::starting_at(start, 14).unwrap();
        assert_eq!(period.end, Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap());
        assert!(!period.has_elapsed(start));
        assert!(period.has_elapsed(period.end));
    }

    #[test]
    fn oversized_period_is_rejected() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let err = TestPeriod::starting_at(start, u32::MAX).unwrap_err();
        assert!(matches!(err, EvolutionError::Validation(_)));
    }
}
