use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Typed field values carried on a classified outcome and in rule conditions.
///
/// Untagged so JSON/YAML literals (`42`, `12.5`, `"annual"`, `true`, `null`)
/// map directly onto the matching variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Extract as string, returning None for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the value. Only `Integer` and `Float` are numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A business event classified by the upstream detection engine.
///
/// Shaped like a revenue leak record: the category it was classified under,
/// the flat field map rule conditions are tested against, and the estimated
/// monetary impact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedOutcome {
    pub id: String,
    pub leak_type: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
    #[serde(default)]
    pub impact: f64,
    pub detected_at: DateTime<Utc>,
}

impl ClassifiedOutcome {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_field_values_from_json() {
        let raw = r#"{"a": 42, "b": 12.5, "c": "annual", "d": true, "e": null}"#;
        let map: HashMap<String, FieldValue> = serde_json::from_str(raw).unwrap();
        assert_eq!(map["a"], FieldValue::Integer(42));
        assert_eq!(map["b"], FieldValue::Float(12.5));
        assert_eq!(map["c"], FieldValue::Text("annual".into()));
        assert_eq!(map["d"], FieldValue::Boolean(true));
        assert_eq!(map["e"], FieldValue::Null);
    }

    #[test]
    fn numeric_view() {
        assert_eq!(FieldValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(FieldValue::Text("3".into()).as_f64(), None);
        assert!(!FieldValue::Boolean(true).is_numeric());
    }

    #[test]
    fn outcome_deserializes_with_defaults() {
        let raw = r#"{
            "id": "leak-1",
            "leak_type": "underbilling",
            "detected_at": "2025-06-14T10:00:00Z"
        }"#;
        let outcome: ClassifiedOutcome = serde_json::from_str(raw).unwrap();
        assert_eq!(outcome.leak_type, "underbilling");
        assert!(outcome.fields.is_empty());
        assert_eq!(outcome.impact, 0.0);
        assert!(outcome.field("amount").is_none());
    }
}
