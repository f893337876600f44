//! Fruit trees.

use super::{FloraId, Position};
use crate::config::FloraConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloraSpecies {
    Apple,
    Pear,
    Plum,
}

impl FloraSpecies {
    pub const ALL: [FloraSpecies; 3] = [FloraSpecies::Apple, FloraSpecies::Pear, FloraSpecies::Plum];

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// A fruit-bearing tree. Each fruit ripens independently and can be
/// harvested once its maturity reaches 1.0.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flora {
    pub id: FloraId,
    pub position: Position,
    pub species: FloraSpecies,
    pub age: f32,
    /// 0.0 (sapling) to 1.0 (fully grown)
    pub growth: f32,
    fruit: Vec<f32>,
    pub seed_cooldown: f32,
    pub alive: bool,
}

impl Flora {
    /// A freshly planted sapling
    pub fn new(id: FloraId, position: Position, species: FloraSpecies) -> Self {
        Self {
            id,
            position,
            species,
            age: 0.0,
            growth: 0.0,
            fruit: Vec::new(),
            seed_cooldown: 0.0,
            alive: true,
        }
    }

    /// A fully grown tree already carrying some ripe fruit
    pub fn mature<R: Rng>(
        id: FloraId,
        position: Position,
        species: FloraSpecies,
        config: &FloraConfig,
        rng: &mut R,
    ) -> Self {
        let ripe = rng.gen_range(1..=config.max_fruit.max(1));
        let mut tree = Self::new(id, position, species);
        tree.age = config.growth_time;
        tree.growth = 1.0;
        tree.seed_cooldown = config.seed_cooldown * rng.gen::<f32>();
        tree.fruit = vec![1.0; ripe];
        tree
    }

    /// Replace the fruit list with `count` ripe fruit
    pub fn with_ripe_fruit(mut self, count: usize) -> Self {
        self.growth = 1.0;
        self.fruit = vec![1.0; count];
        self
    }

    pub fn update<R: Rng>(&mut self, dt: f32, config: &FloraConfig, rng: &mut R) {
        if !self.alive {
            return;
        }

        self.age += dt;
        if self.growth < 1.0 {
            self.growth = (self.age / config.growth_time).min(1.0);
        }

        if self.growth >= config.fruiting_stage
            && self.fruit.len() < config.max_fruit
            && rng.gen::<f32>() < config.fruit_chance * dt
        {
            self.fruit.push(0.0);
        }

        for maturity in &mut self.fruit {
            *maturity = (*maturity + config.ripen_rate * dt).min(1.0);
        }

        if self.seed_cooldown > 0.0 {
            self.seed_cooldown -= dt;
        }

        if self.age >= config.max_age {
            self.alive = false;
        }
    }

    #[inline]
    pub fn fruit_count(&self) -> usize {
        self.fruit.len()
    }

    pub fn ripe_fruit_count(&self) -> usize {
        self.fruit.iter().filter(|&&m| m >= 1.0).count()
    }

    #[inline]
    pub fn has_ripe_fruit(&self) -> bool {
        self.alive && self.fruit.iter().any(|&m| m >= 1.0)
    }

    /// Remove one ripe fruit. False if none is ripe.
    pub fn harvest_one(&mut self) -> bool {
        match self.fruit.iter().position(|&m| m >= 1.0) {
            Some(index) => {
                self.fruit.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Fully grown and off seeding cooldown
    pub fn ready_to_seed(&self) -> bool {
        self.alive && self.growth >= 1.0 && self.seed_cooldown <= 0.0
    }
}
