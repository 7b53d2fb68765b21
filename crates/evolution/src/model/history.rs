//! Append-only lifecycle events recorded per rule version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventType {
    Created,
    Mutated,
    Tested,
    Promoted,
    Deprecated,
}

impl std::fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryEventType::Created => write!(f, "created"),
            HistoryEventType::Mutated => write!(f, "mutated"),
            HistoryEventType::Tested => write!(f, "tested"),
            HistoryEventType::Promoted => write!(f, "promoted"),
            HistoryEventType::Deprecated => write!(f, "deprecated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: HistoryEventType,
    pub details: serde_json::Value,
}

impl HistoryEvent {
    pub fn now(event_type: HistoryEventType, details: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            details,
        }
    }
}
