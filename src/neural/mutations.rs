//! Weight mutations for decision networks.

use super::network::{DecisionModel, WEIGHT_LIMIT};
use rand::Rng;

impl DecisionModel {
    /// Perturb each weight and bias with probability `rate` by uniform noise
    /// in [-strength, strength]. Values stay within +/- [`WEIGHT_LIMIT`].
    /// Returns the number of values changed.
    pub fn mutate<R: Rng>(&mut self, rate: f32, strength: f32, rng: &mut R) -> usize {
        if rate <= 0.0 || strength <= 0.0 {
            return 0;
        }

        let rate = rate.min(1.0);
        let mut mutated = 0;
        for layer in self.layers_mut() {
            for value in layer.values_mut() {
                if rng.gen::<f32>() < rate {
                    let delta = rng.gen_range(-strength..=strength);
                    *value = (*value + delta).clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT);
                    mutated += 1;
                }
            }
        }
        mutated
    }
}
