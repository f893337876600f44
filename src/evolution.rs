//! Evolution mechanics and selection.

use crate::config::{AgentConfig, Config, EvolutionConfig, GenomeConfig};
use crate::entities::{Agent, IdAllocator, Position};
use crate::error::ModelError;
use crate::genetics::Genome;
use rand::seq::SliceRandom;
use rand::Rng;

/// Evolution engine for managing population genetics.
///
/// Runs between ticks: it reads an outgoing population and returns a new
/// one, leaving the world untouched. The caller swaps it in.
#[derive(Clone, Debug)]
pub struct EvolutionEngine {
    pub evolution: EvolutionConfig,
    pub genome: GenomeConfig,
    pub agents: AgentConfig,
    /// Generations produced so far (0 for the founding population)
    pub generation: u32,
}

impl EvolutionEngine {
    /// Create evolution engine from config
    pub fn from_config(config: &Config) -> Self {
        Self {
            evolution: config.evolution.clone(),
            genome: config.genome.clone(),
            agents: config.agents.clone(),
            generation: 0,
        }
    }

    /// Number of elites carried over from a population of `n`
    pub fn elite_count(&self, n: usize) -> usize {
        ((n as f32 * self.evolution.elite_fraction).floor() as usize)
            .max(1)
            .min(n)
    }

    /// Random founders, one per spawn point up to `population_size`
    pub fn create_initial_population<R: Rng>(
        &self,
        spawn_points: &[Position],
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Vec<Agent> {
        let size = self.evolution.population_size;
        (0..size)
            .map(|i| {
                let genome = Genome::random(&self.genome, rng);
                let position = self.spawn_at(spawn_points, i, rng);
                Agent::founder(ids.next_id(), genome, position, self.generation, &self.agents, rng)
            })
            .collect()
    }

    /// Fitness score for each agent, in population order
    pub fn evaluate_fitness(&self, population: &[Agent]) -> Vec<f32> {
        population.iter().map(|a| a.fitness(&self.agents)).collect()
    }

    /// Breed the next generation from `population`.
    ///
    /// Elites keep their genome unchanged; everyone else is the mutated
    /// crossover of two tournament winners. An empty population restarts
    /// from random genomes.
    pub fn evolve<R: Rng>(
        &mut self,
        population: &[Agent],
        spawn_points: &[Position],
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Result<Vec<Agent>, ModelError> {
        self.generation += 1;

        if population.is_empty() {
            log::warn!(
                "Generation {} has no parents, seeding a random population",
                self.generation
            );
            return Ok(self.create_initial_population(spawn_points, ids, rng));
        }

        let size = self.evolution.population_size;
        let scores = self.evaluate_fitness(population);

        let mut ranked: Vec<usize> = (0..population.len()).collect();
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let elites = self.elite_count(population.len()).min(size);
        let mut next = Vec::with_capacity(size);

        for (slot, &index) in ranked.iter().take(elites).enumerate() {
            let genome = population[index].genome.clone();
            let position = self.spawn_at(spawn_points, slot, rng);
            next.push(Agent::founder(
                ids.next_id(),
                genome,
                position,
                self.generation,
                &self.agents,
                rng,
            ));
        }

        let indices: Vec<usize> = (0..population.len()).collect();
        while next.len() < size {
            let a = self.tournament(&indices, &scores, rng);
            let b = self.tournament(&indices, &scores, rng);
            let mut genome = Genome::crossover(
                &population[a].genome,
                &population[b].genome,
                self.evolution.brain_crossover,
                &self.genome,
                rng,
            )?;
            genome.mutate(&self.evolution, &self.genome, rng);

            let position = self.spawn_at(spawn_points, next.len(), rng);
            let mut child = Agent::founder(
                ids.next_id(),
                genome,
                position,
                self.generation,
                &self.agents,
                rng,
            );
            child.parents = Some((population[a].id, population[b].id));
            next.push(child);
        }

        let best = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        log::debug!(
            "Bred generation {}: {} agents ({} elites), best parent fitness {:.2}",
            self.generation,
            next.len(),
            elites,
            best
        );
        Ok(next)
    }

    /// Tournament selection: sample a few, keep the fittest
    fn tournament<R: Rng>(&self, indices: &[usize], scores: &[f32], rng: &mut R) -> usize {
        let k = self.evolution.tournament_size.clamp(1, indices.len());
        indices
            .choose_multiple(rng, k)
            .copied()
            .max_by(|&a, &b| scores[a].total_cmp(&scores[b]))
            .unwrap_or(indices[0])
    }

    /// Spawn point `slot`, jittered once the list is exhausted
    fn spawn_at<R: Rng>(&self, spawn_points: &[Position], slot: usize, rng: &mut R) -> Position {
        match spawn_points.get(slot) {
            Some(&p) => p,
            None if spawn_points.is_empty() => Position::default(),
            None => {
                let base = spawn_points[slot % spawn_points.len()];
                let j = self.evolution.spawn_jitter;
                if j > 0.0 {
                    Position::new(
                        base.x + rng.gen_range(-j..=j),
                        base.y,
                        base.z + rng.gen_range(-j..=j),
                    )
                } else {
                    base
                }
            }
        }
    }
}
