//! World simulation engine - main simulation loop.

use crate::clock::SimClock;
use crate::config::Config;
use crate::entities::{
    Agent, AgentId, DeathCause, Fauna, FaunaId, FaunaSpecies, Flora, FloraId, FloraSpecies,
    IdAllocator, Position, Shelter, ShelterId, TickContext,
};
use crate::error::{ModelError, SimError};
use crate::events::{EventBuffer, EventSink, SimEvent};
use crate::evolution::EvolutionEngine;
use crate::neural::DecisionHook;
use crate::stats::{Stats, StatsHistory};
use crate::terrain::{Biome, HeightField};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Random draws tried before settling for an unsuitable site
const PLACEMENT_ATTEMPTS: usize = 32;
/// Golden angle in radians, used to spread spawn points
const GOLDEN_ANGLE: f32 = 2.399_963;

/// The simulation world
pub struct World {
    // Configuration
    pub config: Config,

    // Environment
    terrain: HeightField,
    clock: SimClock,

    // Population
    agents: Vec<Agent>,
    flora: Vec<Flora>,
    fauna: Vec<Fauna>,
    shelters: Vec<Shelter>,

    // Statistics
    pub stats: Stats,
    pub stats_history: StatsHistory,

    // Observers
    hook: Option<Box<dyn DecisionHook>>,
    sinks: Vec<Box<dyn EventSink>>,
    events: EventBuffer,

    // ID generation
    ids: IdAllocator,
    next_flora_id: FloraId,
    next_fauna_id: FaunaId,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,

    generation: u32,
    generation_start: f64,
    births_this_tick: usize,
    deaths_this_tick: usize,
}

impl World {
    /// Build a populated world: terrain, shelters, flora, fauna and the
    /// founding population.
    pub fn new(config: Config) -> Result<Self, SimError> {
        let mut world = Self::empty(config)?;
        let extent = world.config.world.extent;
        world.prefetch_area(extent.max(world.config.world.shelter_extent));

        for _ in 0..world.config.world.initial_shelters {
            let range = world.config.world.shelter_extent;
            let (x, z) = world.find_site((0.0, 0.0), range, Biome::is_land);
            world.add_shelter(x, z);
        }

        for _ in 0..world.config.world.initial_flora {
            let (x, z) = world.find_site((0.0, 0.0), extent, Biome::supports_flora);
            let species = FloraSpecies::random(&mut world.rng);
            let position = Position::on_terrain(x, z, &world.terrain);
            let tree = if world.rng.gen::<f32>() < world.config.flora.initial_mature_fraction {
                Flora::mature(0, position, species, &world.config.flora, &mut world.rng)
            } else {
                Flora::new(0, position, species)
            };
            world.add_flora(tree);
        }

        for _ in 0..world.config.world.initial_fauna {
            let (x, z) = world.find_site((0.0, 0.0), extent, Biome::is_land);
            let species = FaunaSpecies::random(&mut world.rng);
            world.spawn_fauna(species, x, z);
        }

        let engine = EvolutionEngine::from_config(&world.config);
        let points = world.spawn_points(engine.evolution.population_size);
        let founders = engine.create_initial_population(&points, &mut world.ids, &mut world.rng);
        let mut events = Vec::with_capacity(founders.len());
        for mut agent in founders {
            agent.position.snap(&world.terrain);
            events.push(birth_event(&agent, 0.0));
            world.agents.push(agent);
        }
        world.emit_all(events);
        world.update_stats();

        log::info!(
            "World created (seed {}): {} agents, {} flora, {} fauna, {} shelters",
            world.config.world.seed,
            world.agents.len(),
            world.flora.len(),
            world.fauna.len(),
            world.shelters.len()
        );
        Ok(world)
    }

    /// Terrain and clock only. Entities are added by the caller.
    pub fn empty(config: Config) -> Result<Self, SimError> {
        config.validate()?;
        let seed = config.world.seed;
        let terrain = HeightField::new(&config.terrain, seed)?;

        Ok(Self {
            terrain,
            clock: SimClock::new(&config.clock),
            agents: Vec::with_capacity(config.agents.max_population),
            flora: Vec::new(),
            fauna: Vec::new(),
            shelters: Vec::new(),
            stats: Stats::new(),
            stats_history: StatsHistory::new(config.logging.stats_interval),
            hook: None,
            sinks: Vec::new(),
            events: EventBuffer::new(config.logging.event_buffer),
            ids: IdAllocator::new(),
            next_flora_id: 0,
            next_fauna_id: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            generation: 0,
            generation_start: 0.0,
            births_this_tick: 0,
            deaths_this_tick: 0,
            config,
        })
    }

    /// Main simulation step
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            log::warn!("Ignoring update with non-positive dt {dt}");
            return;
        }
        self.births_this_tick = 0;
        self.deaths_this_tick = 0;

        let was_night = self.clock.is_night();
        self.clock.advance(dt);
        let is_night = self.clock.is_night();
        let daybreak = was_night && !is_night;

        // Phase 1: Agents (needs, overrides, decisions, movement)
        self.update_agents(dt, is_night, daybreak);

        // Phase 2: Pairing in shelters, after everyone has moved
        self.handle_reproduction(dt);
        self.collect_milestones();

        // Phase 3: Environment
        self.update_flora(dt);
        self.update_fauna(dt);

        // Phase 4: Remove the dead
        self.remove_dead();

        // Phase 5: Statistics
        self.update_stats();
    }

    fn update_agents(&mut self, dt: f32, is_night: bool, daybreak: bool) {
        let mut ctx = TickContext {
            dt,
            is_night,
            daybreak,
            terrain: &self.terrain,
            flora: &mut self.flora,
            fauna: &mut self.fauna,
            shelters: &mut self.shelters,
            config: &self.config.agents,
            hook: self.hook.as_deref(),
        };
        for agent in self.agents.iter_mut() {
            agent.update(&mut ctx, &mut self.rng);
        }
    }

    /// Shelters holding exactly two compatible adults may produce a child
    fn handle_reproduction(&mut self, dt: f32) {
        let chance = (self.config.agents.reproduction_chance_per_second * dt).min(1.0);
        if chance <= 0.0 {
            return;
        }

        let pairs: Vec<(ShelterId, usize, usize)> = self
            .shelters
            .iter()
            .filter(|s| s.occupant_count() == 2)
            .filter_map(|s| {
                let mut occupants = s.occupants();
                let a = self.index_of(occupants.next()?)?;
                let b = self.index_of(occupants.next()?)?;
                self.agents[a]
                    .can_reproduce_with(&self.agents[b])
                    .then_some((s.id, a, b))
            })
            .collect();

        let mut living = self.agents.iter().filter(|a| a.alive).count();
        let mut children = Vec::new();
        let mut events = Vec::new();
        let time = self.clock.time;

        for (shelter_id, a, b) in pairs {
            if living >= self.config.agents.max_population {
                log::debug!("Population cap reached, skipping reproduction");
                break;
            }
            if self.rng.gen::<f32>() >= chance {
                continue;
            }

            let Some(shelter) = self.shelters.get(shelter_id.0) else {
                continue;
            };
            let spawn = Position::on_terrain(shelter.position.x, shelter.position.z, &self.terrain);
            let child_id = self.ids.next_id();
            let (first, second) = pair_mut(&mut self.agents, a, b);

            match first.reproduce(
                second,
                child_id,
                spawn,
                &self.config.agents,
                &self.config.genome,
                &self.config.evolution,
                &mut self.rng,
            ) {
                Ok(child) => {
                    events.push(SimEvent::Reproduction {
                        parents: (first.id, second.id),
                        child: child.id,
                        shelter: shelter_id,
                        time,
                    });
                    events.push(birth_event(&child, time));
                    children.push(child);
                    living += 1;
                }
                Err(e) => log::error!("Reproduction in shelter {} failed: {e}", shelter_id.0),
            }
        }

        self.births_this_tick += children.len();
        self.agents.extend(children);
        self.emit_all(events);
    }

    fn collect_milestones(&mut self) {
        let time = self.clock.time;
        let events: Vec<SimEvent> = self
            .agents
            .iter_mut()
            .flat_map(|agent| {
                let (id, name) = (agent.id, agent.name().to_string());
                agent
                    .take_milestones()
                    .into_iter()
                    .map(move |milestone| SimEvent::Milestone {
                        id,
                        name: name.clone(),
                        milestone,
                        time,
                    })
            })
            .collect();
        self.emit_all(events);
    }

    fn update_flora(&mut self, dt: f32) {
        let config = &self.config.flora;
        for tree in self.flora.iter_mut() {
            tree.update(dt, config, &mut self.rng);
        }

        // Mature trees occasionally seed a sapling nearby; dead trees leave one behind
        let mut seeds = Vec::new();
        let mut living = self.flora.iter().filter(|f| f.alive).count();
        for tree in self.flora.iter_mut() {
            let dying = !tree.alive;
            let seeding = tree.ready_to_seed() && self.rng.gen::<f32>() < config.seed_chance * dt;
            if !(dying || seeding) || (!dying && living >= config.max_flora) {
                continue;
            }
            if seeding {
                tree.seed_cooldown = config.seed_cooldown;
            }
            seeds.push((tree.position.x, tree.position.z, tree.species));
            if !dying {
                living += 1;
            }
        }

        let radius = self.config.flora.seed_radius;
        for (x, z, species) in seeds {
            let (sx, sz) = self.find_site((x, z), radius, Biome::supports_flora);
            let position = Position::on_terrain(sx, sz, &self.terrain);
            self.add_flora(Flora::new(0, position, species));
        }
        self.flora.retain(|f| f.alive);
    }

    fn update_fauna(&mut self, dt: f32) {
        let threats: Vec<(f32, f32)> = self
            .agents
            .iter()
            .filter(|a| a.alive)
            .map(|a| (a.position.x, a.position.z))
            .collect();

        let config = &self.config.fauna;
        for animal in self.fauna.iter_mut() {
            animal.update(dt, &threats, &self.terrain, config, &mut self.rng);
        }

        let living = self.fauna.iter().filter(|f| f.alive).count();
        if living < config.max_fauna && self.rng.gen::<f32>() < config.reproduction_chance * dt {
            let parents: Vec<usize> = (0..self.fauna.len())
                .filter(|&i| self.fauna[i].can_reproduce())
                .collect();
            if let Some(&index) = parents.choose(&mut self.rng) {
                let parent = &mut self.fauna[index];
                parent.reproduction_cooldown = config.reproduction_cooldown;
                let (species, x, z) = (parent.species, parent.position.x, parent.position.z);
                let radius = config.offspring_radius;
                let (sx, sz) = self.find_site((x, z), radius, Biome::is_land);
                self.spawn_fauna(species, sx, sz);
            }
        }

        self.fauna.retain(|f| f.alive);
    }

    /// Prune dead agents, releasing their shelter slots
    fn remove_dead(&mut self) {
        let time = self.clock.time;
        let mut events = Vec::new();

        for agent in self.agents.iter().filter(|a| !a.alive) {
            if let Some(shelter) = agent.shelter.and_then(|id| self.shelters.get_mut(id.0)) {
                shelter.remove_occupant(agent.id);
            }
            events.push(SimEvent::Death {
                id: agent.id,
                name: agent.name().to_string(),
                age: agent.age,
                cause: agent.cause_of_death.unwrap_or(DeathCause::Frailty),
                time,
                fruit_collected: agent.fruit_collected,
                animals_hunted: agent.animals_hunted,
                offspring: agent.offspring_count,
            });
        }

        self.deaths_this_tick += events.len();
        self.agents.retain(|a| a.alive);
        self.emit_all(events);
    }

    fn update_stats(&mut self) {
        self.stats.time = self.clock.time;
        self.stats.day = self.clock.day_number;
        self.stats.generation = self.generation;
        self.stats.update(&self.agents, &self.flora, &self.fauna);
        self.stats.births = self.births_this_tick;
        self.stats.deaths = self.deaths_this_tick;

        if self.stats_history.maybe_record(&self.stats) {
            log::debug!("{}", self.stats.summary());
        }
    }

    /// Run for `seconds` of simulated time in steps of `dt`
    pub fn run(&mut self, seconds: f32, dt: f32) {
        self.run_with_callback(seconds, dt, |_| {});
    }

    /// Run with a callback after every tick
    pub fn run_with_callback<F>(&mut self, seconds: f32, dt: f32, mut callback: F)
    where
        F: FnMut(&World),
    {
        if dt <= 0.0 || dt.is_nan() {
            return;
        }
        let steps = (seconds / dt).round() as u64;
        for _ in 0..steps {
            self.update(dt);
            callback(self);
        }
    }

    // ------------------------------------------------------------------
    // Generations
    // ------------------------------------------------------------------

    /// The generation has run its course or the population has collapsed
    pub fn generation_due(&self, engine: &EvolutionEngine) -> bool {
        let elapsed = self.clock.time - self.generation_start;
        elapsed >= engine.evolution.generation_duration as f64
            || self.population() <= engine.evolution.collapse_threshold
    }

    /// One tick followed by a generation boundary check. Returns true if a
    /// new generation was swapped in.
    pub fn update_with_evolution(
        &mut self,
        dt: f32,
        engine: &mut EvolutionEngine,
    ) -> Result<bool, ModelError> {
        self.update(dt);
        if self.generation_due(engine) {
            self.advance_generation(engine)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Breed the next generation and swap it in. Shelter occupancy is
    /// cleared since every outgoing agent leaves the world.
    pub fn advance_generation(&mut self, engine: &mut EvolutionEngine) -> Result<(), ModelError> {
        let scores = engine.evaluate_fitness(&self.agents);
        let best_fitness = scores.iter().copied().fold(0.0, f32::max);
        let mean_fitness = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };
        let outgoing = self.agents.len();

        let points = self.spawn_points(engine.evolution.population_size);
        let mut next = engine.evolve(&self.agents, &points, &mut self.ids, &mut self.rng)?;
        for agent in next.iter_mut() {
            agent.position.snap(&self.terrain);
        }

        for shelter in self.shelters.iter_mut() {
            shelter.clear_occupants();
        }
        self.agents = next;
        self.generation = engine.generation;
        self.generation_start = self.clock.time;

        let time = self.clock.time;
        let mut events: Vec<SimEvent> = self.agents.iter().map(|a| birth_event(a, time)).collect();
        events.push(SimEvent::GenerationAdvanced {
            generation: self.generation,
            population: self.agents.len(),
            best_fitness,
            mean_fitness,
            time,
        });
        self.emit_all(events);
        self.update_stats();

        log::info!(
            "Generation {} begins: {} agents bred from {} (best fitness {:.1})",
            self.generation,
            self.agents.len(),
            outgoing,
            best_fitness
        );
        Ok(())
    }

    /// Deterministic land positions spiralling out from the origin
    pub fn spawn_points(&self, n: usize) -> Vec<Position> {
        let radius = self.config.world.spawn_radius;
        let thresholds = &self.config.terrain.biomes;

        (0..n)
            .map(|i| {
                let r = radius * ((i as f32 + 0.5) / n as f32).sqrt();
                let angle = i as f32 * GOLDEN_ANGLE;
                let (dx, dz) = (angle.cos() * r, angle.sin() * r);
                // Pull toward the origin until we hit dry ground
                let scale = [1.0, 0.75, 0.5, 0.25]
                    .into_iter()
                    .find(|s| self.terrain.biome_at(dx * s, dz * s, thresholds).is_land())
                    .unwrap_or(0.0);
                Position::on_terrain(dx * scale, dz * scale, &self.terrain)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------

    /// Generate the terrain chunks covering a square of half-width `extent`
    pub fn prefetch_area(&self, extent: f32) -> usize {
        let e = extent as f64;
        let min = self.terrain.chunk_coord(-e, -e);
        let max = self.terrain.chunk_coord(e, e);
        self.terrain.prefetch(min, max)
    }

    fn find_site(&mut self, center: (f32, f32), range: f32, accept: fn(&Biome) -> bool) -> (f32, f32) {
        let thresholds = &self.config.terrain.biomes;
        let mut site = center;
        if range <= 0.0 {
            return site;
        }
        for _ in 0..PLACEMENT_ATTEMPTS {
            site = (
                center.0 + self.rng.gen_range(-range..=range),
                center.1 + self.rng.gen_range(-range..=range),
            );
            if accept(&self.terrain.biome_at(site.0, site.1, thresholds)) {
                break;
            }
        }
        site
    }

    /// Insert an agent, snapped to the terrain
    pub fn add_agent(&mut self, mut agent: Agent) -> AgentId {
        agent.position.snap(&self.terrain);
        if agent.id.0 >= self.ids.peek() {
            self.ids = IdAllocator::starting_after(agent.id.0);
        }
        let id = agent.id;
        self.agents.push(agent);
        id
    }

    /// Reserve a fresh agent id
    pub fn next_agent_id(&mut self) -> AgentId {
        self.ids.next_id()
    }

    /// Insert a tree, assigning it a fresh id
    pub fn add_flora(&mut self, mut tree: Flora) -> FloraId {
        tree.id = self.next_flora_id;
        self.next_flora_id += 1;
        tree.position.snap(&self.terrain);
        let id = tree.id;
        self.flora.push(tree);
        id
    }

    /// Spawn an animal of `species` at (x, z)
    pub fn spawn_fauna(&mut self, species: FaunaSpecies, x: f32, z: f32) -> FaunaId {
        let id = self.next_fauna_id;
        self.next_fauna_id += 1;
        let position = Position::on_terrain(x, z, &self.terrain);
        let animal = Fauna::new(id, species, position, &self.config.fauna, &mut self.rng);
        self.fauna.push(animal);
        id
    }

    /// Build a shelter at (x, z)
    pub fn add_shelter(&mut self, x: f32, z: f32) -> ShelterId {
        let id = ShelterId(self.shelters.len());
        let position = Position::on_terrain(x, z, &self.terrain);
        self.shelters
            .push(Shelter::new(id, position, self.config.shelter.capacity));
        id
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Replace every agent's own decision model with `hook`
    pub fn set_hook(&mut self, hook: Box<dyn DecisionHook>) {
        log::info!("Decision hook set: {}", hook.name());
        self.hook = Some(hook);
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Most recent events
    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    fn emit_all(&mut self, events: Vec<SimEvent>) {
        for event in &events {
            self.events.record(event);
            for sink in self.sinks.iter_mut() {
                sink.record(event);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.terrain.height(x, z)
    }

    pub fn biome_at(&self, x: f32, z: f32) -> Biome {
        self.terrain.biome_at(x, z, &self.config.terrain.biomes)
    }

    pub fn terrain(&self) -> &HeightField {
        &self.terrain
    }

    pub fn is_night(&self) -> bool {
        self.clock.is_night()
    }

    pub fn light_intensity(&self) -> f32 {
        self.clock.light_intensity()
    }

    /// 0.0 to 1.0, 0.5 is noon
    pub fn time_of_day(&self) -> f32 {
        self.clock.time_of_day()
    }

    pub fn day_number(&self) -> u32 {
        self.clock.day_number
    }

    /// Total simulated seconds
    pub fn time(&self) -> f64 {
        self.clock.time
    }

    /// Jump the clock to `hour` of the current day
    pub fn set_hour(&mut self, hour: f32) {
        self.clock.set_hour(hour);
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn flora(&self) -> &[Flora] {
        &self.flora
    }

    pub fn fauna(&self) -> &[Fauna] {
        &self.fauna
    }

    pub fn shelters(&self) -> &[Shelter] {
        &self.shelters
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Mutable access for hosts that script agents
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    fn index_of(&self, id: AgentId) -> Option<usize> {
        self.agents.iter().position(|a| a.id == id)
    }

    /// Living agents
    pub fn population(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    pub fn is_extinct(&self) -> bool {
        self.population() == 0
    }

    pub fn seed(&self) -> u64 {
        self.config.world.seed
    }
}

fn birth_event(agent: &Agent, time: f64) -> SimEvent {
    SimEvent::Birth {
        id: agent.id,
        name: agent.name().to_string(),
        parents: agent.parents,
        time,
    }
}

/// Two distinct mutable elements of a slice
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs distinct indices");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
