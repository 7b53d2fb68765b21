pub mod config;
pub mod outcome;

pub use config::{Config, EvolutionConfig, WorkerConfig};
pub use outcome::*;
