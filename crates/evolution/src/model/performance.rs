//! Running performance metrics for rules and candidates.

use serde::{Deserialize, Serialize};

use crate::error::{EvolutionError, Result};

/// Weight given to a freshly computed batch when merging into stored metrics.
pub const EMA_WEIGHT: f64 = 0.3;

/// Accumulated detection metrics. Ratios live in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulePerformance {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub total_applications: u64,
    pub successful_applications: u64,
    pub average_impact: f64,
}

impl RulePerformance {
    /// Derive batch metrics from confusion counts.
    ///
    /// `total` is the number of outcomes the rule was applied to. Every ratio
    /// resolves to zero when its denominator is zero.
    pub fn from_counts(
        true_positives: u64,
        false_positives: u64,
        total: u64,
        average_impact: f64,
    ) -> Self {
        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, total);
        Self {
            accuracy: ratio(true_positives, total),
            precision,
            recall,
            f1_score: f1(precision, recall),
            total_applications: total,
            successful_applications: true_positives,
            average_impact,
        }
    }

    /// Fold a freshly computed batch into these running metrics.
    ///
    /// Ratios use an exponential moving average that keeps 70% of the stored
    /// value. Application counters add up; average impact is the plain mean of
    /// old and new.
    pub fn merge(&self, batch: &RulePerformance) -> RulePerformance {
        RulePerformance {
            accuracy: ema(self.accuracy, batch.accuracy),
            precision: ema(self.precision, batch.precision),
            recall: ema(self.recall, batch.recall),
            f1_score: ema(self.f1_score, batch.f1_score),
            total_applications: self.total_applications + batch.total_applications,
            successful_applications: self.successful_applications
                + batch.successful_applications,
            average_impact: (self.average_impact + batch.average_impact) / 2.0,
        }
    }

    /// Overwrite the metrics present in `update` and count one more application.
    pub fn apply_update(&mut self, update: &PerformanceUpdate) {
        if let Some(v) = update.accuracy {
            self.accuracy = v;
        }
        if let Some(v) = update.precision {
            self.precision = v;
        }
        if let Some(v) = update.recall {
            self.recall = v;
        }
        if let Some(v) = update.f1_score {
            self.f1_score = v;
        }
        if let Some(v) = update.average_impact {
            self.average_impact = v;
        }
        self.total_applications += 1;
        if update.successful {
            self.successful_applications += 1;
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("accuracy", self.accuracy)?;
        check_unit("precision", self.precision)?;
        check_unit("recall", self.recall)?;
        check_unit("f1_score", self.f1_score)?;
        if self.successful_applications > self.total_applications {
            return Err(EvolutionError::Validation(format!(
                "successful_applications {} exceeds total_applications {}",
                self.successful_applications, self.total_applications
            )));
        }
        Ok(())
    }
}

/// Partial metrics reported for one scored outcome during an A/B test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceUpdate {
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub recall: Option<f64>,
    #[serde(default)]
    pub f1_score: Option<f64>,
    #[serde(default)]
    pub average_impact: Option<f64>,
    /// Whether the candidate's application on this outcome was a hit.
    #[serde(default)]
    pub successful: bool,
}

impl PerformanceUpdate {
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1_score", self.f1_score),
        ];
        for (name, value) in ratios {
            if let Some(v) = value {
                check_unit(name, v)?;
            }
        }
        if let Some(v) = self.average_impact {
            if !v.is_finite() {
                return Err(EvolutionError::Validation(format!(
                    "average_impact must be finite, got {}",
                    v
                )));
            }
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(EvolutionError::Validation(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    let sum = precision + recall;
    if sum <= 0.0 {
        0.0
    } else {
        2.0 * precision * recall / sum
    }
}

fn ema(old: f64, fresh: f64) -> f64 {
    (old * (1.0 - EMA_WEIGHT) + fresh * EMA_WEIGHT).clamp(0.0, 1.0)
}
