//! Decision networks for agent brains.
//!
//! Implements fixed-topology feed-forward networks with:
//! - Dense layer representation and a flat weight view
//! - Weight mutations
//! - Crossover between networks of equal topology
//! - Feature extraction and output decoding
//! - Pluggable decision hooks

mod crossover;
pub mod features;
pub mod hook;
mod mutations;
mod network;

pub use crossover::CrossoverStrategy;
pub use features::{decode_action, decode_movement, Action, FeatureInputs, Features, FEATURE_COUNT};
pub use hook::{Decision, DecisionHook, RuleBasedReasoner};
pub use network::{DecisionModel, Layer, ModelOutput, Topology, MOVEMENT_OUTPUTS, WEIGHT_LIMIT};
