//! Evolvable rule types: conditions, actions, status and the rule itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use leakwatch_core::{ClassifiedOutcome, FieldValue};

use super::key::RuleKey;
use super::performance::RulePerformance;
use crate::error::{EvolutionError, Result};

// ── Conditions ──────────────────────────────────────────────────────

/// Comparison operator for a single rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
}

impl ConditionOperator {
    /// Apply the operator with `actual` on the left and `expected` on the right.
    ///
    /// Ordering operators only hold between numeric values. Equality compares
    /// numerically when both sides are numeric, structurally otherwise.
    pub fn compare(&self, actual: &FieldValue, expected: &FieldValue) -> bool {
        match self {
            ConditionOperator::Equals => values_equal(actual, expected),
            ConditionOperator::NotEquals => !values_equal(actual, expected),
            ConditionOperator::GreaterThan => numeric(actual, expected, |a, b| a > b),
            ConditionOperator::GreaterThanOrEqual => numeric(actual, expected, |a, b| a >= b),
            ConditionOperator::LessThan => numeric(actual, expected, |a, b| a < b),
            ConditionOperator::LessThanOrEqual => numeric(actual, expected, |a, b| a <= b),
            ConditionOperator::Contains => match (actual.as_str(), expected.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
        }
    }
}

fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= f64::EPSILON,
        _ => a == b,
    }
}

fn numeric(a: &FieldValue, b: &FieldValue, op: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => op(x, y),
        _ => false,
    }
}

/// A single field/operator/value test with a static confidence weight.
///
/// `confidence` is how predictive this condition is believed to be on its
/// own. It is authored, not learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: FieldValue,
    pub confidence: f64,
}

impl RuleCondition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: FieldValue,
        confidence: f64,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            confidence,
        }
    }

    /// Whether the outcome satisfies this condition. A missing field never matches.
    pub fn matches(&self, outcome: &ClassifiedOutcome) -> bool {
        outcome
            .field(&self.field)
            .map_or(false, |actual| self.operator.compare(actual, &self.value))
    }

    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            return Err(EvolutionError::Validation(
                "condition field must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(EvolutionError::Validation(format!(
                "condition '{}' confidence {} is outside [0, 1]",
                self.field, self.confidence
            )));
        }
        Ok(())
    }
}

// ── Actions ─────────────────────────────────────────────────────────

/// Side effect to trigger when a rule's conditions match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Alert,
    CreateTask,
    UpdateRecord,
    Notify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Lower runs first.
    pub priority: u32,
    #[serde(default)]
    pub params: serde_json::Value,
}

// ── Rule ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Active,
    Testing,
    Deprecated,
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleStatus::Active => write!(f, "active"),
            RuleStatus::Testing => write!(f, "testing"),
            RuleStatus::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// One version of a detection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolvableRule {
    pub key: RuleKey,
    pub name: String,
    /// Category of business event this rule detects.
    pub leak_type: String,
    /// ANDed together; order is preserved through mutation.
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub performance: RulePerformance,
    pub status: RuleStatus,
    #[serde(default)]
    pub parent: Option<RuleKey>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl EvolvableRule {
    /// A fresh active rule with zeroed performance.
    pub fn new(
        key: RuleKey,
        name: impl Into<String>,
        leak_type: impl Into<String>,
        conditions: Vec<RuleCondition>,
        actions: Vec<RuleAction>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            name: name.into(),
            leak_type: leak_type.into(),
            conditions,
            actions,
            performance: RulePerformance::default(),
            status: RuleStatus::Active,
            parent: None,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// True when every condition holds for the outcome. A rule with no
    /// conditions matches everything of its leak type.
    pub fn matches(&self, outcome: &ClassifiedOutcome) -> bool {
        self.conditions.iter().all(|c| c.matches(outcome))
    }

    /// Actions ordered by ascending priority; ties keep authored order.
    pub fn actions_by_priority(&self) -> Vec<&RuleAction> {
        let mut actions: Vec<&RuleAction> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.priority);
        actions
    }

    pub fn validate(&self) -> Result<()> {
        if self.key.family.trim().is_empty() {
            return Err(EvolutionError::Validation(
                "rule family must not be empty".to_string(),
            ));
        }
        if self.key.version == 0 {
            return Err(EvolutionError::Validation(format!(
                "rule '{}' version must start at 1",
                self.key.family
            )));
        }
        if self.leak_type.trim().is_empty() {
            return Err(EvolutionError::Validation(format!(
                "rule '{}' has no leak type",
                self.key
            )));
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        self.performance.validate()
    }
}
