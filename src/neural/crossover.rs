//! Genetic crossover between decision networks.

use super::network::DecisionModel;
use crate::error::ModelError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Strategy for crossover operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverStrategy {
    /// Randomly select each weight from either parent
    #[default]
    Uniform,
    /// Average weights from both parents
    Average,
}

impl DecisionModel {
    /// Uniform per-weight crossover
    pub fn crossover<R: Rng>(a: &Self, b: &Self, rng: &mut R) -> Result<Self, ModelError> {
        Self::crossover_with_strategy(a, b, CrossoverStrategy::Uniform, rng)
    }

    /// Recombine two parents of identical topology. Mismatched parents are
    /// rejected rather than truncated.
    pub fn crossover_with_strategy<R: Rng>(
        a: &Self,
        b: &Self,
        strategy: CrossoverStrategy,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        if a.topology() != b.topology() {
            return Err(ModelError::TopologyMismatch {
                expected: a.topology().to_string(),
                actual: b.topology().to_string(),
            });
        }

        let mut child = a.clone();
        for (child_layer, other_layer) in child.layers_mut().zip(b.layers()) {
            match strategy {
                CrossoverStrategy::Uniform => {
                    for (w, &o) in child_layer.values_mut().zip(other_layer.values()) {
                        if rng.gen_bool(0.5) {
                            *w = o;
                        }
                    }
                }
                CrossoverStrategy::Average => {
                    for (w, &o) in child_layer.values_mut().zip(other_layer.values()) {
                        *w = (*w + o) / 2.0;
                    }
                }
            }
        }

        Ok(child)
    }
}
