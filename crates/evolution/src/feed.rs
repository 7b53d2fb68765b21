//! Outcome feed: hands each distinct outcome batch to the caller once.
//!
//! The worker re-reads the same file on every tick. Scoring an unchanged
//! batch again would double-count its applications and drag the moving
//! average toward the same sample, so a batch whose SHA-256 matches the last
//! consumed one is skipped.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use leakwatch_core::ClassifiedOutcome;

use crate::seed::SeedError;

pub struct OutcomeFeed {
    path: PathBuf,
    last_hash: Option<String>,
}

impl OutcomeFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_hash: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and return its outcomes if they have not been consumed
    /// yet. `Ok(None)` means the batch is unchanged since the last poll.
    ///
    /// A batch only counts as consumed once it parsed, so a malformed file is
    /// retried after it is fixed.
    pub fn poll(&mut self) -> Result<Option<Vec<ClassifiedOutcome>>, SeedError> {
        let bytes = std::fs::read(&self.path)?;
        let hash = content_hash(&bytes);
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            debug!(path = %self.path.display(), "outcome batch unchanged");
            return Ok(None);
        }

        let outcomes: Vec<ClassifiedOutcome> = serde_json::from_slice(&bytes)?;
        self.last_hash = Some(hash);
        Ok(Some(outcomes))
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConditionOperator, EvolvableRule, RuleCondition, RuleKey};
    use crate::EvolutionEngine;
    use leakwatch_core::{EvolutionConfig, FieldValue};

    const BATCH: &str = r#"[
        {"id": "o1", "leak_type": "underbilling", "fields": {"amount": 150},
         "impact": 10.0, "detected_at": "2026-01-05T10:00:00Z"},
        {"id": "o2", "leak_type": "underbilling", "fields": {"amount": 50},
         "impact": 5.0, "detected_at": "2026-01-05T10:05:00Z"}
    ]"#;

    fn engine() -> EvolutionEngine {
        let engine = EvolutionEngine::new(EvolutionConfig::default());
        engine
            .add_rule(EvolvableRule::new(
                RuleKey::initial("underbilling"),
                "Underbilling",
                "underbilling",
                vec![RuleCondition::new(
                    "amount",
                    ConditionOperator::GreaterThan,
                    FieldValue::Integer(100),
                    0.9,
                )],
                vec![],
            ))
            .unwrap();
        engine
    }

    /// One worker tick: score the batch only when the feed has a new one.
    fn tick(engine: &EvolutionEngine, feed: &mut OutcomeFeed) -> bool {
        match feed.poll().unwrap() {
            Some(outcomes) => {
                engine.evaluate_rules(&outcomes).unwrap();
                true
            }
            None => false,
        }
    }

    #[test]
    fn unchanged_batch_is_consumed_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outcomes.json");
        std::fs::write(&path, BATCH).unwrap();

        let engine = engine();
        let mut feed = OutcomeFeed::new(&path);
        assert!(tick(&engine, &mut feed));
        let after_first = engine.get_rule(&RuleKey::initial("underbilling")).unwrap();

        for _ in 0..3 {
            assert!(!tick(&engine, &mut feed));
        }
        let after_many = engine.get_rule(&RuleKey::initial("underbilling")).unwrap();
        assert_eq!(after_many, after_first);
        assert_eq!(after_many.performance.total_applications, 2);
    }

    #[test]
    fn new_content_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outcomes.json");
        std::fs::write(&path, BATCH).unwrap();

        let engine = engine();
        let mut feed = OutcomeFeed::new(&path);
        assert!(tick(&engine, &mut feed));

        std::fs::write(&path, BATCH.replace("\"o1\"", "\"o3\"")).unwrap();
        assert!(tick(&engine, &mut feed));
        let rule = engine.get_rule(&RuleKey::initial("underbilling")).unwrap();
        assert_eq!(rule.performance.total_applications, 4);
    }

    #[test]
    fn malformed_batch_is_retried_once_fixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outcomes.json");
        std::fs::write(&path, "[{").unwrap();

        let mut feed = OutcomeFeed::new(&path);
        assert!(matches!(feed.poll(), Err(SeedError::Json(_))));
        assert!(matches!(feed.poll(), Err(SeedError::Json(_))));

        std::fs::write(&path, BATCH).unwrap();
        assert_eq!(feed.poll().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut feed = OutcomeFeed::new(dir.path().join("absent.json"));
        assert!(matches!(feed.poll(), Err(SeedError::Io(_))));
    }
}
