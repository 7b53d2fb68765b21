//! Proposed structural changes to a rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::key::RuleKey;
use super::rule::RuleCondition;

/// Discriminant of a [`MutationChange`], used for reporting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    ThresholdAdjust,
    ConditionRemove,
    ConditionAdd,
}

impl std::fmt::Display for MutationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationType::ThresholdAdjust => write!(f, "threshold_adjust"),
            MutationType::ConditionRemove => write!(f, "condition_remove"),
            MutationType::ConditionAdd => write!(f, "condition_add"),
        }
    }
}

/// Position of one condition in the mutated rule's condition list, plus the
/// field it tests. A rule version's conditions never change after creation,
/// so the index stays valid for as long as the mutation does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionRef {
    pub index: usize,
    pub field: String,
}

impl ConditionRef {
    pub fn new(index: usize, field: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
        }
    }

    /// True when `conditions[index]` exists and still tests `field`.
    pub fn resolves_in(&self, conditions: &[RuleCondition]) -> bool {
        conditions
            .get(self.index)
            .is_some_and(|c| c.field == self.field)
    }
}

/// The concrete edit a mutation makes to a rule's condition list.
///
/// Threshold moves and removals name individual conditions, so a range rule
/// like `amount > 100 AND amount < 500` can move one bound without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationChange {
    /// Replace the numeric threshold of one condition.
    ThresholdAdjust {
        index: usize,
        field: String,
        from: f64,
        to: f64,
    },
    /// Drop the listed conditions.
    ConditionRemove { conditions: Vec<ConditionRef> },
    /// Append one condition.
    ConditionAdd { condition: RuleCondition },
}

impl MutationChange {
    /// Fields the change touches, for hypotheses and logs.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            MutationChange::ThresholdAdjust { field, .. } => vec![field.as_str()],
            MutationChange::ConditionRemove { conditions } => {
                conditions.iter().map(|c| c.field.as_str()).collect()
            }
            MutationChange::ConditionAdd { condition } => vec![condition.field.as_str()],
        }
    }

    pub fn mutation_type(&self) -> MutationType {
        match self {
            MutationChange::ThresholdAdjust { .. } => MutationType::ThresholdAdjust,
            MutationChange::ConditionRemove { .. } => MutationType::ConditionRemove,
            MutationChange::ConditionAdd { .. } => MutationType::ConditionAdd,
        }
    }
}

/// Lifecycle of a mutation. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Proposed,
    Testing,
    Rejected,
    Adopted,
}

impl MutationStatus {
    pub fn can_transition_to(&self, next: MutationStatus) -> bool {
        use MutationStatus::*;
        matches!(
            (self, next),
            (Proposed, Testing) | (Proposed, Rejected) | (Testing, Rejected) | (Testing, Adopted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MutationStatus::Rejected | MutationStatus::Adopted)
    }
}

impl std::fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationStatus::Proposed => write!(f, "proposed"),
            MutationStatus::Testing => write!(f, "testing"),
            MutationStatus::Rejected => write!(f, "rejected"),
            MutationStatus::Adopted => write!(f, "adopted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMutation {
    pub id: Uuid,
    /// Rule version the change is relative to.
    pub rule: RuleKey,
    pub change: MutationChange,
    pub hypothesis: String,
    pub status: MutationStatus,
    pub created_at: DateTime<Utc>,
}

impl RuleMutation {
    pub fn proposed(rule: RuleKey, change: MutationChange, hypothesis: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule,
            change,
            hypothesis: hypothesis.into(),
            status: MutationStatus::Proposed,
            created_at: Utc::now(),
        }
    }

    pub fn mutation_type(&self) -> MutationType {
        self.change.mutation_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use MutationStatus::*;
        assert!(Proposed.can_transition_to(Testing));
        assert!(Proposed.can_transition_to(Rejected));
        assert!(Testing.can_transition_to(Adopted));
        assert!(Testing.can_transition_to(Rejected));

        assert!(!Testing.can_transition_to(Proposed));
        assert!(!Adopted.can_transition_to(Testing));
        assert!(!Rejected.can_transition_to(Adopted));
        assert!(!Proposed.can_transition_to(Adopted));
        assert!(!Proposed.can_transition_to(Proposed));
    }

    #[test]
    fn change_is_tagged_by_type() {
        let change = MutationChange::ConditionRemove {
            conditions: vec![ConditionRef::new(2, "region")],
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "condition_remove");
        assert_eq!(json["conditions"][0]["index"], 2);
        assert_eq!(json["conditions"][0]["field"], "region");
        assert_eq!(change.mutation_type(), MutationType::ConditionRemove);
        assert_eq!(change.fields(), vec!["region"]);
    }

    #[test]
    fn condition_ref_checks_field_at_index() {
        use crate::model::ConditionOperator;
        use leakwatch_core::FieldValue;

        let conditions = vec![
            RuleCondition::new("amount", ConditionOperator::GreaterThan, FieldValue::Integer(100), 0.9),
            RuleCondition::new("amount", ConditionOperator::LessThan, FieldValue::Integer(500), 0.9),
        ];
        assert!(ConditionRef::new(1, "amount").resolves_in(&conditions));
        assert!(!ConditionRef::new(1, "plan").resolves_in(&conditions));
        assert!(!ConditionRef::new(2, "amount").resolves_in(&conditions));
    }
}
