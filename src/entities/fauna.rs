//! Huntable animals that wander and flee from agents.

use super::{FaunaId, Position};
use crate::config::FaunaConfig;
use crate::terrain::HeightField;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaunaSpecies {
    Deer,
    Rabbit,
    Boar,
}

/// Fixed per-species attributes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeciesStats {
    pub speed: f32,
    pub size: f32,
    pub max_health: f32,
    /// Hunger restored to the agent that kills it
    pub meat_value: f32,
}

impl FaunaSpecies {
    pub const ALL: [FaunaSpecies; 3] = [FaunaSpecies::Deer, FaunaSpecies::Rabbit, FaunaSpecies::Boar];

    pub fn stats(self) -> SpeciesStats {
        match self {
            FaunaSpecies::Deer => SpeciesStats {
                speed: 1.5,
                size: 1.0,
                max_health: 50.0,
                meat_value: 40.0,
            },
            FaunaSpecies::Rabbit => SpeciesStats {
                speed: 2.0,
                size: 0.5,
                max_health: 20.0,
                meat_value: 15.0,
            },
            FaunaSpecies::Boar => SpeciesStats {
                speed: 1.0,
                size: 1.2,
                max_health: 80.0,
                meat_value: 50.0,
            },
        }
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// An animal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fauna {
    pub id: FaunaId,
    pub species: FaunaSpecies,
    pub position: Position,
    pub health: f32,
    pub age: f32,
    pub max_age: f32,
    pub wander_target: Option<(f32, f32)>,
    pub flee_target: Option<(f32, f32)>,
    pub flee_timer: f32,
    pub reproduction_cooldown: f32,
    pub alive: bool,
}

impl Fauna {
    pub fn new<R: Rng>(
        id: FaunaId,
        species: FaunaSpecies,
        position: Position,
        config: &FaunaConfig,
        rng: &mut R,
    ) -> Self {
        let max_age = if config.min_age < config.max_age {
            rng.gen_range(config.min_age..config.max_age)
        } else {
            config.max_age
        };
        Self {
            id,
            species,
            position,
            health: species.stats().max_health,
            age: 0.0,
            max_age,
            wander_target: None,
            flee_target: None,
            flee_timer: 0.0,
            reproduction_cooldown: config.reproduction_cooldown,
            alive: true,
        }
    }

    #[inline]
    pub fn stats(&self) -> SpeciesStats {
        self.species.stats()
    }

    #[inline]
    pub fn is_fleeing(&self) -> bool {
        self.flee_timer > 0.0
    }

    /// Advance one tick. `threats` holds (x, z) of every living agent.
    pub fn update<R: Rng>(
        &mut self,
        dt: f32,
        threats: &[(f32, f32)],
        terrain: &HeightField,
        config: &FaunaConfig,
        rng: &mut R,
    ) {
        if !self.alive {
            return;
        }

        self.age += dt;
        if self.age >= self.max_age {
            self.alive = false;
            return;
        }
        if self.reproduction_cooldown > 0.0 {
            self.reproduction_cooldown -= dt;
        }
        if self.flee_timer > 0.0 {
            self.flee_timer -= dt;
            if self.flee_timer <= 0.0 {
                self.flee_target = None;
            }
        }

        let speed = self.stats().speed;
        let nearest = threats
            .iter()
            .map(|&(x, z)| (self.position.distance_xz(x, z), x, z))
            .filter(|&(d, _, _)| d < config.threat_range)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((distance, tx, tz)) = nearest {
            self.flee_timer = config.flee_duration;
            if distance > 0.01 {
                let away_x = (self.position.x - tx) / distance;
                let away_z = (self.position.z - tz) / distance;
                self.flee_target = Some((
                    self.position.x + away_x * config.flee_distance,
                    self.position.z + away_z * config.flee_distance,
                ));
            }
        }

        if let Some((fx, fz)) = self.flee_target.filter(|_| self.is_fleeing()) {
            let step = speed * config.flee_speed_multiplier * dt;
            self.position.step_toward(fx, fz, step, 0.5);
        } else {
            if self.wander_target.is_none() {
                self.wander_target = self.pick_wander_target(terrain, config, rng);
            }
            if let Some((wx, wz)) = self.wander_target {
                if self.position.step_toward(wx, wz, speed * dt, 0.5) {
                    self.wander_target = None;
                }
            }
        }

        self.position.snap(terrain);
    }

    fn pick_wander_target<R: Rng>(
        &self,
        terrain: &HeightField,
        config: &FaunaConfig,
        rng: &mut R,
    ) -> Option<(f32, f32)> {
        let angle = rng.gen_range(0.0..TAU);
        let distance = rng.gen_range(3.0..8.0);
        let x = self.position.x + angle.cos() * distance;
        let z = self.position.z + angle.sin() * distance;
        // Too steep: try again next tick
        if (terrain.height(x, z) - self.position.y).abs() > config.max_climb {
            None
        } else {
            Some((x, z))
        }
    }

    /// Apply damage. Returns true if this blow killed the animal.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        if !self.alive {
            return false;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.alive = false;
            return true;
        }
        false
    }

    pub fn can_reproduce(&self) -> bool {
        self.alive && self.reproduction_cooldown <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (HeightField, FaunaConfig, ChaCha8Rng) {
        (
            HeightField::new(&TerrainConfig::default(), 42).unwrap(),
            FaunaConfig::default(),
            ChaCha8Rng::seed_from_u64(1),
        )
    }

    #[test]
    fn test_species_stats() {
        assert_eq!(FaunaSpecies::Rabbit.stats().max_health, 20.0);
        assert_eq!(FaunaSpecies::Boar.stats().meat_value, 50.0);
        assert!(FaunaSpecies::Rabbit.stats().speed > FaunaSpecies::Boar.stats().speed);
    }

    #[test]
    fn test_flees_from_nearby_agent() {
        let (terrain, config, mut rng) = setup();
        let start = Position::on_terrain(0.0, 0.0, &terrain);
        let mut deer = Fauna::new(1, FaunaSpecies::Deer, start, &config, &mut rng);

        deer.update(0.5, &[(-3.0, 0.0)], &terrain, &config, &mut rng);
        assert!(deer.is_fleeing());
        assert!(deer.position.x > 0.0, "moves away from the threat");
        assert_eq!(deer.position.y, terrain.height(deer.position.x, deer.position.z));
    }

    #[test]
    fn test_ignores_distant_agents() {
        let (terrain, config, mut rng) = setup();
        let start = Position::on_terrain(0.0, 0.0, &terrain);
        let mut boar = Fauna::new(1, FaunaSpecies::Boar, start, &config, &mut rng);
        boar.update(0.1, &[(50.0, 50.0)], &terrain, &config, &mut rng);
        assert!(!boar.is_fleeing());
    }

    #[test]
    fn test_take_damage_kills_once() {
        let (_, config, mut rng) = setup();
        let mut rabbit = Fauna::new(1, FaunaSpecies::Rabbit, Position::default(), &config, &mut rng);
        assert!(!rabbit.take_damage(10.0));
        assert!(rabbit.take_damage(10.0));
        assert!(!rabbit.alive);
        assert!(!rabbit.take_damage(10.0));
    }

    #[test]
    fn test_dies_of_old_age() {
        let (terrain, config, mut rng) = setup();
        let mut deer = Fauna::new(1, FaunaSpecies::Deer, Position::default(), &config, &mut rng);
        assert!(deer.max_age >= config.min_age && deer.max_age < config.max_age);
        deer.age = deer.max_age;
        deer.update(0.1, &[], &terrain, &config, &mut rng);
        assert!(!deer.alive);
    }
}
