//! Seed loading: initial rule definitions from YAML and outcome batches from
//! JSON.
//!
//! ```yaml
//! rules:
//!   - family: underbilling
//!     name: Underbilled seats
//!     leak_type: underbilling
//!     conditions:
//!       - { field: amount, operator: greater_than, value: 100, confidence: 0.8 }
//!     actions:
//!       - { type: alert, priority: 1 }
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use leakwatch_core::ClassifiedOutcome;

use crate::engine::EvolutionEngine;
use crate::model::{EvolvableRule, RuleAction, RuleCondition, RuleKey};

/// Errors from reading seed and outcome files.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// One rule entry in a seed document.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSeed {
    pub family: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub name: String,
    pub leak_type: String,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

fn default_version() -> u32 {
    1
}

impl RuleSeed {
    pub fn key(&self) -> RuleKey {
        RuleKey::new(self.family.clone(), self.version)
    }

    /// A fresh active rule with zeroed performance.
    pub fn into_rule(self) -> EvolvableRule {
        EvolvableRule::new(
            self.key(),
            self.name,
            self.leak_type,
            self.conditions,
            self.actions,
        )
    }
}

#[derive(Debug, Deserialize)]
struct SeedDocument {
    #[serde(default)]
    rules: Vec<RuleSeed>,
}

/// Parse a YAML seed document. Duplicate keys are rejected up front.
pub fn parse_seed_rules(yaml: &str) -> Result<Vec<RuleSeed>, SeedError> {
    let doc: SeedDocument = serde_yaml::from_str(yaml)?;
    let mut seen = std::collections::HashSet::new();
    for seed in &doc.rules {
        if !seen.insert(seed.key()) {
            return Err(SeedError::Validation(format!(
                "duplicate rule {} in seed document",
                seed.key()
            )));
        }
    }
    Ok(doc.rules)
}

pub fn load_seed_rules(path: &Path) -> Result<Vec<RuleSeed>, SeedError> {
    let contents = std::fs::read_to_string(path)?;
    parse_seed_rules(&contents)
}

/// Read a JSON array of classified outcomes.
pub fn load_outcomes(path: &Path) -> Result<Vec<ClassifiedOutcome>, SeedError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Outcome of registering a single seed rule.
#[derive(Debug)]
pub struct SeedResult {
    pub key: RuleKey,
    pub status: SeedStatus,
}

#[derive(Debug)]
pub enum SeedStatus {
    Loaded,
    Failed { error: String },
}

impl SeedResult {
    pub fn is_loaded(&self) -> bool {
        matches!(self.status, SeedStatus::Loaded)
    }
}

/// Register every seed with the engine. One bad seed does not stop the rest.
pub fn seed_engine(engine: &EvolutionEngine, seeds: Vec<RuleSeed>) -> Vec<SeedResult> {
    let mut results = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let key = seed.key();
        match engine.add_rule(seed.into_rule()) {
            Ok(()) => results.push(SeedResult {
                key,
                status: SeedStatus::Loaded,
            }),
            Err(e) => {
                warn!(rule_id = %key, error = %e, "seed rule rejected");
                results.push(SeedResult {
                    key,
                    status: SeedStatus::Failed {
                        error: e.to_string(),
                    },
                });
            }
        }
    }

    let loaded = results.iter().filter(|r| r.is_loaded()).count();
    info!(
        loaded,
        failed = results.len() - loaded,
        "seed rules registered"
    );
    results
}
