//! evolution-worker: periodic evaluation and auto-evolution over file inputs.
//!
//! Seeds the engine from a YAML rules file, then on every tick polls the
//! outcome batch file, scores the active rules when the batch is new and runs
//! one auto-evolution cycle. Stops on Ctrl-C or after `--cycles` ticks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};

use leakwatch_core::config::load_dotenv;
use leakwatch_core::Config;
use leakwatch_evolution::feed::OutcomeFeed;
use leakwatch_evolution::seed::{load_seed_rules, seed_engine};
use leakwatch_evolution::EvolutionEngine;

// ── CLI ─────────────────────────────────────────────────────────────

/// Rule evolution worker.
#[derive(Parser, Debug)]
#[command(name = "evolution-worker", version, about)]
struct Cli {
    /// YAML seed rules. Overrides RULES_FILE from the profile.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// JSON outcome batch, scored once per distinct content. Overrides OUTCOMES_FILE.
    #[arg(long)]
    outcomes: Option<PathBuf>,

    /// Tick interval in seconds. Overrides EVOLUTION_INTERVAL_SECS.
    #[arg(long)]
    interval: Option<u64>,

    /// Stop after this many ticks. Runs until Ctrl-C when absent.
    #[arg(long, env = "EVOLUTION_CYCLES")]
    cycles: Option<u64>,
}

// ── Tick ────────────────────────────────────────────────────────────

fn run_cycle(engine: &EvolutionEngine, feed: &mut OutcomeFeed) {
    match feed.poll() {
        Ok(Some(outcomes)) => match engine.evaluate_rules(&outcomes) {
            Ok(scored) => info!(outcomes = outcomes.len(), rules = scored.len(), "batch evaluated"),
            Err(e) => error!(error = %e, "evaluation failed"),
        },
        Ok(None) => debug!(path = %feed.path().display(), "no new outcomes, skipping evaluation"),
        Err(e) => {
            warn!(path = %feed.path().display(), error = %e, "outcome batch unavailable, skipping evaluation");
        }
    }

    let report = engine.auto_evolve();
    for key in &report.evolved_rules {
        info!(rule_id = %key, "new candidate awaiting test");
    }

    let stats = engine.get_stats();
    info!(
        active = stats.active_rules,
        deprecated = stats.deprecated_rules,
        pending_mutations = stats.pending_mutations,
        candidates = stats.candidates,
        running_tests = stats.running_tests,
        avg_f1 = stats.average_active_f1,
        "evolution stats"
    );
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();
    debug!(config = %config.summary_json(), "effective config");

    let rules_file = cli.rules.unwrap_or(config.worker.rules_file);
    let outcomes_file = cli.outcomes.unwrap_or(config.worker.outcomes_file);
    let interval = cli.interval.unwrap_or(config.worker.interval_secs).max(1);

    let engine = EvolutionEngine::new(config.evolution);
    let seeds = load_seed_rules(&rules_file)?;
    let results = seed_engine(&engine, seeds);
    if !results.iter().any(|r| r.is_loaded()) {
        anyhow::bail!("no rules loaded from {}", rules_file.display());
    }

    info!(
        rules = %rules_file.display(),
        outcomes = %outcomes_file.display(),
        interval_secs = interval,
        "evolution-worker starting"
    );

    let mut feed = OutcomeFeed::new(&outcomes_file);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    let mut completed = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(&engine, &mut feed);
                completed += 1;
                if cli.cycles.is_some_and(|n| completed >= n) {
                    info!(cycles = completed, "cycle limit reached");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("evolution-worker exited cleanly");
    Ok(())
}
