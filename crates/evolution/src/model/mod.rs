//! Data model for evolvable rules and their lifecycle records.
//!
//! - `EvolvableRule`: one version of a rule, keyed by [`RuleKey`]
//! - `RuleMutation`: a proposed change, typed per mutation kind
//! - `RuleCandidate`: a full alternate rule body awaiting an A/B test
//! - `RuleTest`: a control-vs-candidate comparison
//! - `HistoryEvent`: one entry of a rule's audit trail

mod candidate;
mod history;
mod key;
mod mutation;
mod performance;
mod rule;

pub use ab_test::*;
pub use candidate::*;
pub use history::*;
pub use key::*;
pub use mutation::*;
pub use performance::*;
pub use rule::*;
