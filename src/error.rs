//! Error types for configuration, terrain construction and genome operations.
//!
//! Soft failures inside a tick (a full shelter, a tree stripped of fruit
//! before arrival) are never errors; agents recover from them locally.

use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read or write configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Terrain parameters that cannot produce a height field.
#[derive(Debug, Error, PartialEq)]
pub enum TerrainError {
    #[error("chunk size must be at least 2, got {0}")]
    ChunkTooSmall(usize),
    #[error("max height must be finite and positive, got {0}")]
    InvalidMaxHeight(f32),
    #[error("noise layer `{layer}` has invalid {field}: {value}")]
    InvalidLayer {
        layer: &'static str,
        field: &'static str,
        value: f64,
    },
    #[error("noise layer amplitudes sum to zero")]
    ZeroAmplitude,
    #[error("flatten exponent must be finite and positive, got {0}")]
    InvalidFlatten(f32),
}

/// Decision-model genome violations. These are precondition failures:
/// recombining mismatched networks would silently corrupt the genome.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("decision model topology mismatch: expected {expected}, got {actual}")]
    TopologyMismatch { expected: String, actual: String },
    #[error("weight vector has {actual} values, topology needs {expected}")]
    WeightCount { expected: usize, actual: usize },
    #[error("expected {expected} input features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },
}

/// World construction failure.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("terrain construction failed: {0}")]
    Terrain(#[from] TerrainError),
    #[error("genome operation failed: {0}")]
    Model(#[from] ModelError),
}
