//! Heritable agent description: physical traits plus a decision network.

use super::names::Name;
use crate::config::{EvolutionConfig, GenomeConfig};
use crate::error::ModelError;
use crate::neural::{CrossoverStrategy, DecisionModel, Topology};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Named physical traits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trait {
    Speed,
    Size,
    Stamina,
    VisionRange,
    FoodPreference,
}

impl Trait {
    pub const ALL: [Trait; 5] = [
        Trait::Speed,
        Trait::Size,
        Trait::Stamina,
        Trait::VisionRange,
        Trait::FoodPreference,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Trait::Speed => "speed",
            Trait::Size => "size",
            Trait::Stamina => "stamina",
            Trait::VisionRange => "vision_range",
            Trait::FoodPreference => "food_preference",
        }
    }
}

/// Initial and valid ranges of one trait
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraitBounds {
    /// Range sampled by random genomes
    pub init: (f32, f32),
    /// Range every crossover or mutation result is clamped into
    pub clamp: (f32, f32),
}

impl TraitBounds {
    pub const fn new(init: (f32, f32), clamp: (f32, f32)) -> Self {
        Self { init, clamp }
    }

    /// Init range is ordered and lies within the clamp range
    pub fn is_consistent(&self) -> bool {
        self.init.0 <= self.init.1
            && self.clamp.0 <= self.clamp.1
            && self.clamp.0 <= self.init.0
            && self.init.1 <= self.clamp.1
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        if self.init.0 < self.init.1 {
            rng.gen_range(self.init.0..=self.init.1)
        } else {
            self.init.0
        }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.clamp.0, self.clamp.1)
        } else {
            self.init.0.clamp(self.clamp.0, self.clamp.1)
        }
    }

    fn span(&self) -> f32 {
        self.clamp.1 - self.clamp.0
    }
}

impl GenomeConfig {
    pub fn bounds(&self, t: Trait) -> &TraitBounds {
        match t {
            Trait::Speed => &self.speed,
            Trait::Size => &self.size,
            Trait::Stamina => &self.stamina,
            Trait::VisionRange => &self.vision_range,
            Trait::FoodPreference => &self.food_preference,
        }
    }

    pub fn topology(&self) -> Topology {
        Topology::with_hidden(&self.hidden_layers)
    }
}

/// Trait values of one genome
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    pub speed: f32,
    pub size: f32,
    pub stamina: f32,
    pub vision_range: f32,
    pub food_preference: f32,
}

impl Traits {
    pub fn random<R: Rng>(config: &GenomeConfig, rng: &mut R) -> Self {
        let mut traits = Self::default();
        for t in Trait::ALL {
            traits.set(t, config.bounds(t).sample(rng));
        }
        traits
    }

    pub fn get(&self, t: Trait) -> f32 {
        match t {
            Trait::Speed => self.speed,
            Trait::Size => self.size,
            Trait::Stamina => self.stamina,
            Trait::VisionRange => self.vision_range,
            Trait::FoodPreference => self.food_preference,
        }
    }

    pub fn set(&mut self, t: Trait, value: f32) {
        let slot = match t {
            Trait::Speed => &mut self.speed,
            Trait::Size => &mut self.size,
            Trait::Stamina => &mut self.stamina,
            Trait::VisionRange => &mut self.vision_range,
            Trait::FoodPreference => &mut self.food_preference,
        };
        *slot = value;
    }

    /// Every trait forced into its clamp range
    pub fn clamped(mut self, config: &GenomeConfig) -> Self {
        for t in Trait::ALL {
            self.set(t, config.bounds(t).clamp(self.get(t)));
        }
        self
    }

    pub fn within_bounds(&self, config: &GenomeConfig) -> bool {
        Trait::ALL.iter().all(|&t| {
            let b = config.bounds(t);
            (b.clamp.0..=b.clamp.1).contains(&self.get(t))
        })
    }
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            speed: 1.0,
            size: 1.0,
            stamina: 100.0,
            vision_range: 10.0,
            food_preference: 0.5,
        }
    }
}

/// Everything an agent inherits
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub name: Name,
    pub traits: Traits,
    pub brain: DecisionModel,
}

impl Genome {
    pub fn random<R: Rng>(config: &GenomeConfig, rng: &mut R) -> Self {
        Self {
            name: Name::random(rng),
            traits: Traits::random(config, rng),
            brain: DecisionModel::random(config.topology(), config.initial_weight_range, rng),
        }
    }

    /// Child genome: each trait copied from either parent with equal
    /// probability, brains recombined with `strategy`, family name taken
    /// from `a`.
    pub fn crossover<R: Rng>(
        a: &Genome,
        b: &Genome,
        strategy: CrossoverStrategy,
        config: &GenomeConfig,
        rng: &mut R,
    ) -> Result<Genome, ModelError> {
        let brain = DecisionModel::crossover_with_strategy(&a.brain, &b.brain, strategy, rng)?;

        let mut traits = a.traits;
        for t in Trait::ALL {
            if rng.gen_bool(0.5) {
                traits.set(t, b.traits.get(t));
            }
        }

        Ok(Genome {
            name: Name::inherit(&a.name, rng),
            traits: traits.clamped(config),
            brain,
        })
    }

    /// Perturb traits and brain weights in place. Each trait mutates with
    /// probability `trait_mutation_rate` by up to +/- `trait_mutation_scale`
    /// of its value and is then clamped.
    pub fn mutate<R: Rng>(&mut self, evolution: &EvolutionConfig, config: &GenomeConfig, rng: &mut R) {
        let scale = config.trait_mutation_scale;
        if scale > 0.0 {
            for t in Trait::ALL {
                if rng.gen::<f32>() < evolution.trait_mutation_rate {
                    let bounds = config.bounds(t);
                    let value = self.traits.get(t);
                    let magnitude = scale * value.abs().max(bounds.span() * 0.1);
                    if magnitude > 0.0 {
                        let delta = rng.gen_range(-magnitude..=magnitude);
                        self.traits.set(t, value + delta);
                    }
                }
            }
        }
        self.traits = self.traits.clamped(config);

        self.brain
            .mutate(evolution.mutation_rate, evolution.mutation_strength, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_config() -> GenomeConfig {
        GenomeConfig {
            hidden_layers: vec![8],
            ..GenomeConfig::default()
        }
    }

    #[test]
    fn test_random_genome_within_init_ranges() {
        let config = small_config();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            let genome = Genome::random(&config, &mut rng);
            for t in Trait::ALL {
                let b = config.bounds(t);
                let v = genome.traits.get(t);
                assert!(v >= b.init.0 && v <= b.init.1, "{} = {v}", t.name());
            }
        }
    }

    #[test]
    fn test_crossover_traits_come_from_parents() {
        let config = small_config();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let a = Genome::random(&config, &mut rng);
        let b = Genome::random(&config, &mut rng);

        let child = Genome::crossover(&a, &b, CrossoverStrategy::Uniform, &config, &mut rng).unwrap();
        for t in Trait::ALL {
            let v = child.traits.get(t);
            assert!(v == a.traits.get(t) || v == b.traits.get(t));
        }
        assert_eq!(child.name.family, a.name.family);
    }

    #[test]
    fn test_self_crossover_keeps_traits_and_brain() {
        let config = small_config();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = Genome::random(&config, &mut rng);
        let child = Genome::crossover(&a, &a, CrossoverStrategy::Uniform, &config, &mut rng).unwrap();
        assert_eq!(child.traits, a.traits);
        assert_eq!(child.brain, a.brain);
    }

    #[test]
    fn test_crossover_rejects_mismatched_brains() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let a = Genome::random(&small_config(), &mut rng);
        let wide = GenomeConfig {
            hidden_layers: vec![12],
            ..GenomeConfig::default()
        };
        let b = Genome::random(&wide, &mut rng);
        let result = Genome::crossover(&a, &b, CrossoverStrategy::Uniform, &wide, &mut rng);
        assert!(matches!(result, Err(ModelError::TopologyMismatch { .. })));
    }

    #[test]
    fn test_mutation_respects_clamp_bounds() {
        let config = small_config();
        let evolution = EvolutionConfig {
            trait_mutation_rate: 1.0,
            ..EvolutionConfig::default()
        };
        let strong = GenomeConfig {
            trait_mutation_scale: 5.0,
            ..small_config()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut genome = Genome::random(&config, &mut rng);
        for _ in 0..100 {
            genome.mutate(&evolution, &strong, &mut rng);
            assert!(genome.traits.within_bounds(&strong));
        }
    }

    #[test]
    fn test_zero_valued_trait_can_mutate() {
        let config = small_config();
        let evolution = EvolutionConfig {
            trait_mutation_rate: 1.0,
            ..EvolutionConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut genome = Genome::random(&config, &mut rng);
        genome.traits.food_preference = 0.0;
        let moved = (0..20).any(|_| {
            genome.mutate(&evolution, &config, &mut rng);
            genome.traits.food_preference != 0.0
        });
        assert!(moved);
    }

    #[test]
    fn test_bounds_consistency() {
        assert!(TraitBounds::new((1.0, 2.0), (0.5, 3.0)).is_consistent());
        assert!(!TraitBounds::new((1.0, 4.0), (0.5, 3.0)).is_consistent());
        assert!(!TraitBounds::new((2.0, 1.0), (0.5, 3.0)).is_consistent());
        assert_eq!(TraitBounds::new((1.0, 2.0), (0.5, 3.0)).clamp(f32::NAN), 1.0);
    }
}
