use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub evolution: EvolutionConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LEAKWATCH_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LEAKWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            evolution: EvolutionConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        let e = &self.evolution;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  evolution:   enabled={}, auto_evolve={}, mutation_rate={}, testing_period_days={}, min_sample_size={}",
            e.enabled,
            e.auto_evolve_enabled,
            e.mutation_rate,
            e.testing_period_days,
            e.min_sample_size
        );
        tracing::info!(
            "  worker:      rules={}, outcomes={}, interval={}s",
            self.worker.rules_file.display(),
            self.worker.outcomes_file.display(),
            self.worker.interval_secs
        );
    }

    /// Effective settings as JSON, for structured logs.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "evolution": {
                "enabled": self.evolution.enabled,
                "auto_evolve_enabled": self.evolution.auto_evolve_enabled,
                "mutation_rate": self.evolution.mutation_rate,
                "testing_period_days": self.evolution.testing_period_days,
                "min_sample_size": self.evolution.min_sample_size,
            },
            "worker": {
                "rules_file": self.worker.rules_file,
                "outcomes_file": self.worker.outcomes_file,
                "interval_secs": self.worker.interval_secs,
            },
        })
    }
}

// ── Rule evolution ────────────────────────────────────────────

/// Longest A/B test window accepted from the environment.
pub const MAX_TESTING_PERIOD_DAYS: u32 = 3650;

/// Tunables for the rule evolution engine, fixed at engine construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Master switch. When off, `auto_evolve` never does anything.
    pub enabled: bool,
    pub auto_evolve_enabled: bool,
    /// Probability in [0, 1] that a triggered rule gets its first mutation applied.
    pub mutation_rate: f64,
    /// Length of a candidate's A/B test window.
    pub testing_period_days: u32,
    /// Applications after which a rule is considered for evolution regardless of F1.
    pub min_sample_size: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_evolve_enabled: true,
            mutation_rate: 0.1,
            testing_period_days: 14,
            min_sample_size: 100,
        }
    }
}

impl EvolutionConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            enabled: profiled_env_bool(p, "EVOLUTION_ENABLED", defaults.enabled),
            auto_evolve_enabled: profiled_env_bool(
                p,
                "EVOLUTION_AUTO_EVOLVE",
                defaults.auto_evolve_enabled,
            ),
            mutation_rate: profiled_env_f64(p, "EVOLUTION_MUTATION_RATE", defaults.mutation_rate)
                .clamp(0.0, 1.0),
            testing_period_days: profiled_env_u32(
                p,
                "EVOLUTION_TESTING_PERIOD_DAYS",
                defaults.testing_period_days,
            )
            .clamp(1, MAX_TESTING_PERIOD_DAYS),
            min_sample_size: profiled_env_u64(
                p,
                "EVOLUTION_MIN_SAMPLE_SIZE",
                defaults.min_sample_size,
            ),
        }
    }

    /// Whether the auto-evolution loop should run at all.
    pub fn auto_evolve_active(&self) -> bool {
        self.enabled && self.auto_evolve_enabled
    }
}

// ── Worker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// YAML file with seed rules.
    pub rules_file: PathBuf,
    /// JSON file holding the latest classified outcome batch.
    pub outcomes_file: PathBuf,
    pub interval_secs: u64,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_file: PathBuf::from(profiled_env_or(p, "RULES_FILE", "data/rules.yml")),
            outcomes_file: PathBuf::from(profiled_env_or(
                p,
                "OUTCOMES_FILE",
                "data/outcomes.json",
            )),
            interval_secs: profiled_env_u64(p, "EVOLUTION_INTERVAL_SECS", 60),
        }
    }
}
