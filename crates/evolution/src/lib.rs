//! Rule evolution engine for revenue-leak detection.
//!
//! This crate provides:
//! - Versioned detection rules keyed by family and version
//! - A mutation generator proposing threshold moves and condition removals
//! - Candidate building, A/B testing and promotion into new rule versions
//! - Batch evaluation of active rules against classified outcomes
//! - A periodic auto-evolution loop with an injectable random source
//! - YAML seed loading, a consume-once outcome feed and the
//!   `evolution-worker` binary

pub mod ab_test;
pub mod auto_evolve;
pub mod candidate;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod feed;
pub mod generator;
pub mod model;
pub mod promotion;
pub mod seed;
pub mod store;

pub use auto_evolve::AutoEvolveReport;
pub use engine::{EvolutionEngine, EvolutionStats};
pub use error::{EntityKind, EvolutionError, Result};
pub use store::EngineStores;
