//! Agents: needs, lifecycle and the behavior state machine.
//!
//! Each tick an agent runs three layers in order:
//! 1. Needs and aging (may kill the agent).
//! 2. Hard overrides: night while unsheltered forces adults into
//!    `SeekingShelter` and holds children in `Resting`, daybreak turns
//!    `InShelter` into `Wandering`. While either is in force the decision
//!    source is not consulted.
//! 3. Every `decision_interval` seconds the decision source picks an
//!    action, which is gated for feasibility, then the current state moves
//!    the agent toward its target.

use super::{AgentId, Fauna, FaunaId, Flora, FloraId, Position, Shelter, ShelterId};
use crate::config::{AgentConfig, EvolutionConfig, GenomeConfig};
use crate::error::ModelError;
use crate::genetics::{Genome, Name};
use crate::neural::{decode_movement, Action, DecisionHook, FeatureInputs, Features};
use crate::terrain::HeightField;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Life stage. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    Child,
    Adult,
    Elder,
}

/// Behavior state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Wandering,
    SeekingFood,
    Eating,
    Resting,
    SeekingShelter,
    InShelter,
}

impl AgentState {
    pub fn as_action(self) -> Action {
        match self {
            AgentState::Wandering => Action::Wander,
            AgentState::SeekingFood => Action::SeekFood,
            AgentState::Eating => Action::Eat,
            AgentState::Resting => Action::Rest,
            AgentState::SeekingShelter => Action::SeekShelter,
            AgentState::InShelter => Action::StayInShelter,
        }
    }

    pub fn from_action(action: Action) -> Self {
        match action {
            Action::Wander => AgentState::Wandering,
            Action::SeekFood => AgentState::SeekingFood,
            Action::Eat => AgentState::Eating,
            Action::Rest => AgentState::Resting,
            Action::SeekShelter => AgentState::SeekingShelter,
            Action::StayInShelter => AgentState::InShelter,
        }
    }
}

/// Cause of death tracking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    OldAge,
    Starvation,
    Exposure,
    Frailty,
}

/// Notable moments reported to event sinks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    BecameAdult,
    BecameElder,
    FirstHunt,
    HadOffspring,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum FoodTarget {
    Flora(FloraId),
    Fauna(FaunaId),
}

/// Everything an agent may read or touch during its update.
pub struct TickContext<'a> {
    pub dt: f32,
    pub is_night: bool,
    /// True on the tick night turns into day
    pub daybreak: bool,
    pub terrain: &'a HeightField,
    pub flora: &'a mut [Flora],
    pub fauna: &'a mut [Fauna],
    pub shelters: &'a mut [Shelter],
    pub config: &'a AgentConfig,
    /// Replaces each agent's own decision model when set
    pub hook: Option<&'a dyn DecisionHook>,
}

/// An autonomous agent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    // Identity
    pub id: AgentId,
    pub generation: u32,
    pub parents: Option<(AgentId, AgentId)>,
    pub genome: Genome,

    // Physical state
    pub position: Position,
    pub size: f32,
    pub health: f32,
    pub max_health: f32,
    pub hunger: f32,
    pub max_hunger: f32,
    pub stamina: f32,
    pub max_stamina: f32,

    // Lifecycle
    pub age: f32,
    /// Seconds lived since this agent entered the world
    pub survival_time: f32,
    pub stage: LifeStage,
    pub adult_age: f32,
    pub elder_age: f32,
    pub lifespan: f32,
    pub reproduction_cooldown: f32,
    pub alive: bool,
    pub cause_of_death: Option<DeathCause>,

    // Behavior
    pub state: AgentState,
    pub last_action: Action,
    pub last_confidence: f32,
    pub shelter: Option<ShelterId>,

    // Statistics
    pub fruit_collected: u32,
    pub animals_hunted: u32,
    pub offspring_count: u32,

    decision_timer: f32,
    hunt_timer: f32,
    move_target: Option<(f32, f32)>,
    food_target: Option<FoodTarget>,
    shelter_target: Option<ShelterId>,
    pending_milestones: Vec<Milestone>,
}

fn jittered<R: Rng>(value: f32, jitter: f32, rng: &mut R) -> f32 {
    if jitter > 0.0 {
        value * (1.0 + rng.gen_range(-jitter..=jitter))
    } else {
        value
    }
}

impl Agent {
    /// A newborn child at `position`
    pub fn new<R: Rng>(
        id: AgentId,
        genome: Genome,
        position: Position,
        generation: u32,
        config: &AgentConfig,
        rng: &mut R,
    ) -> Self {
        let adult_age = jittered(config.adult_age, config.age_jitter, rng);
        let elder_age = jittered(config.elder_age, config.age_jitter, rng).max(adult_age + 1.0);
        let lifespan = jittered(config.lifespan, config.age_jitter, rng).max(elder_age + 1.0);
        let max_stamina = genome.traits.stamina;
        let size = genome.traits.size * config.child_size_factor;

        Self {
            id,
            generation,
            parents: None,
            genome,
            position,
            size,
            health: config.max_health,
            max_health: config.max_health,
            hunger: config.initial_hunger.min(config.max_hunger),
            max_hunger: config.max_hunger,
            stamina: max_stamina,
            max_stamina,
            age: 0.0,
            survival_time: 0.0,
            stage: LifeStage::Child,
            adult_age,
            elder_age,
            lifespan,
            reproduction_cooldown: 0.0,
            alive: true,
            cause_of_death: None,
            state: AgentState::Wandering,
            last_action: Action::Wander,
            last_confidence: 0.0,
            shelter: None,
            fruit_collected: 0,
            animals_hunted: 0,
            offspring_count: 0,
            decision_timer: config.decision_interval,
            hunt_timer: 0.0,
            move_target: None,
            food_target: None,
            shelter_target: None,
            pending_milestones: Vec::new(),
        }
    }

    /// A generation founder: starts life as a young adult
    pub fn founder<R: Rng>(
        id: AgentId,
        genome: Genome,
        position: Position,
        generation: u32,
        config: &AgentConfig,
        rng: &mut R,
    ) -> Self {
        let mut agent = Self::new(id, genome, position, generation, config, rng);
        agent.age = agent.adult_age;
        agent.stage = LifeStage::Adult;
        agent.size = agent.genome.traits.size;
        agent
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.genome.name
    }

    #[inline]
    pub fn is_sheltered(&self) -> bool {
        self.shelter.is_some()
    }

    pub fn can_reproduce(&self) -> bool {
        self.alive && self.stage == LifeStage::Adult && self.reproduction_cooldown <= 0.0
    }

    /// Both alive, adult, off cooldown and registered in the same shelter
    pub fn can_reproduce_with(&self, other: &Agent) -> bool {
        self.id != other.id
            && self.can_reproduce()
            && other.can_reproduce()
            && self.shelter.is_some()
            && self.shelter == other.shelter
    }

    /// Build an offspring from `self` and `other`. Sets both cooldowns; the
    /// caller inserts the returned child into the world.
    #[allow(clippy::too_many_arguments)]
    pub fn reproduce<R: Rng>(
        &mut self,
        other: &mut Agent,
        child_id: AgentId,
        spawn: Position,
        agents: &AgentConfig,
        genomes: &GenomeConfig,
        evolution: &EvolutionConfig,
        rng: &mut R,
    ) -> Result<Agent, ModelError> {
        let mut genome = Genome::crossover(
            &self.genome,
            &other.genome,
            evolution.brain_crossover,
            genomes,
            rng,
        )?;
        genome.mutate(evolution, genomes, rng);

        for parent in [&mut *self, &mut *other] {
            parent.reproduction_cooldown = agents.reproduction_cooldown;
            parent.offspring_count += 1;
            if parent.offspring_count == 1 {
                parent.pending_milestones.push(Milestone::HadOffspring);
            }
        }

        let generation = self.generation.max(other.generation);
        let mut child = Agent::new(child_id, genome, spawn, generation, agents, rng);
        child.parents = Some((self.id, other.id));
        Ok(child)
    }

    /// Scalar fitness from time lived in the world, resources gathered and
    /// health
    pub fn fitness(&self, config: &AgentConfig) -> f32 {
        let gathered = self.fruit_collected as f32 + self.animals_hunted as f32 * config.fitness_hunt_weight;
        self.survival_time * config.fitness_survival_weight
            + gathered * config.fitness_gather_weight
            + self.health.max(0.0) * config.fitness_health_weight
    }

    /// Drain milestones reached since the last call
    pub fn take_milestones(&mut self) -> Vec<Milestone> {
        std::mem::take(&mut self.pending_milestones)
    }

    /// Mark dead. Shelter slots are released by the world at prune time.
    pub fn die(&mut self, cause: DeathCause) {
        if self.alive {
            self.alive = false;
            self.cause_of_death = Some(cause);
        }
    }

    /// Force a state, bypassing the decision layer
    pub fn force_state(&mut self, state: AgentState) {
        self.state = state;
        self.move_target = None;
        self.food_target = None;
        self.shelter_target = None;
    }

    /// Seconds until the next decision
    pub fn decision_timer(&self) -> f32 {
        self.decision_timer
    }

    /// Advance one tick
    pub fn update<R: Rng>(&mut self, ctx: &mut TickContext<'_>, rng: &mut R) {
        if !self.alive {
            return;
        }
        self.position.snap(ctx.terrain);

        self.update_needs(ctx);
        if !self.alive {
            return;
        }

        let overridden = self.apply_overrides(ctx);

        self.decision_timer -= ctx.dt;
        if self.decision_timer <= 0.0 {
            self.decision_timer = ctx.config.decision_interval;
            if !overridden {
                self.decide(ctx, rng);
            }
        }

        self.act(ctx, rng);
        self.position.snap(ctx.terrain);
        self.last_action = self.state.as_action();
    }

    fn update_needs(&mut self, ctx: &TickContext<'_>) {
        let c = ctx.config;
        let dt = ctx.dt;

        self.age += dt;
        self.survival_time += dt;
        if self.reproduction_cooldown > 0.0 {
            self.reproduction_cooldown -= dt;
        }
        if self.hunt_timer > 0.0 {
            self.hunt_timer -= dt;
        }

        let stage = if self.age >= self.elder_age {
            LifeStage::Elder
        } else if self.age >= self.adult_age {
            LifeStage::Adult
        } else {
            LifeStage::Child
        };
        if stage > self.stage {
            if self.stage == LifeStage::Child {
                self.pending_milestones.push(Milestone::BecameAdult);
            }
            if stage == LifeStage::Elder {
                self.pending_milestones.push(Milestone::BecameElder);
            }
            self.stage = stage;
            self.size = self.genome.traits.size;
        }

        if self.age >= self.lifespan {
            self.die(DeathCause::OldAge);
            return;
        }

        self.hunger -= c.hunger_decay * dt;
        if self.hunger <= 0.0 {
            self.hunger = 0.0;
            self.health -= c.starvation_damage * dt;
        }

        let deficit = 1.0 - self.hunger / self.max_hunger;
        let mut decay = c.health_decay * (1.0 + c.hunger_health_pressure * deficit);
        let exposed = ctx.is_night && self.shelter.is_none();
        if exposed {
            decay *= c.night_exposure_multiplier;
        }
        self.health -= decay * dt;

        if self.health <= 0.0 {
            self.health = 0.0;
            let cause = if self.hunger <= 0.0 {
                DeathCause::Starvation
            } else if exposed {
                DeathCause::Exposure
            } else {
                DeathCause::Frailty
            };
            self.die(cause);
            return;
        }

        match self.state {
            AgentState::Resting => self.stamina += c.stamina_regen * dt,
            _ if self.shelter.is_some() => self.stamina += c.shelter_stamina_regen * dt,
            AgentState::Eating => self.stamina -= c.stamina_drain * c.eating_stamina_factor * dt,
            _ => self.stamina -= c.stamina_drain * dt,
        }
        self.stamina = self.stamina.clamp(0.0, self.max_stamina);
    }

    /// Returns true while an override suppresses decisions
    fn apply_overrides(&mut self, ctx: &mut TickContext<'_>) -> bool {
        if ctx.daybreak && self.state == AgentState::InShelter {
            self.leave_shelter(ctx.shelters);
            self.set_state(AgentState::Wandering, ctx.shelters);
            return true;
        }

        if !ctx.is_night {
            return false;
        }

        // Children have no claim on shelter slots
        if self.stage == LifeStage::Child {
            if self.state != AgentState::Resting {
                self.set_state(AgentState::Resting, ctx.shelters);
            }
            return true;
        }

        if self.shelter.is_none() && self.state != AgentState::SeekingShelter {
            self.set_state(AgentState::SeekingShelter, ctx.shelters);
        }
        true
    }

    fn features(&self, ctx: &TickContext<'_>) -> Features {
        let c = ctx.config;
        let vision = self.genome.traits.vision_range;
        let nearest_food = self.preferred_food(ctx, vision).map(|(_, d)| d);

        let nearest_shelter = if self.shelter.is_some() {
            Some(0.0)
        } else {
            self.nearest_free_shelter(ctx.shelters, c.shelter_search_radius)
                .map(|(_, d)| d)
        };

        Features::extract(&FeatureInputs {
            health_ratio: self.health / self.max_health,
            hunger_ratio: self.hunger / self.max_hunger,
            stamina_ratio: if self.max_stamina > 0.0 {
                self.stamina / self.max_stamina
            } else {
                0.0
            },
            age_ratio: self.age / self.lifespan,
            stage: self.stage,
            is_night: ctx.is_night,
            nearest_food,
            nearest_shelter,
            vision_range: vision,
            shelter_search_radius: c.shelter_search_radius,
            can_reproduce: self.can_reproduce(),
            in_shelter: self.shelter.is_some(),
            last_action: self.last_action,
        })
    }

    fn decide<R: Rng>(&mut self, ctx: &mut TickContext<'_>, rng: &mut R) {
        let features = self.features(ctx);
        let decision = match ctx.hook {
            Some(hook) => hook.decide(&features),
            None => self.genome.brain.decide(&features),
        };
        self.last_confidence = decision.confidence;

        let action = self.feasible(decision.action, ctx);
        let state = AgentState::from_action(action);
        if state == self.state {
            if state == AgentState::Wandering && self.move_target.is_none() {
                self.move_target = self.intent_target(decision.movement, ctx.config, rng);
            }
            return;
        }

        self.set_state(state, ctx.shelters);
        if state == AgentState::Wandering {
            self.move_target = self.intent_target(decision.movement, ctx.config, rng);
        }
    }

    /// Fall back to the next action this agent can actually perform
    fn feasible(&self, action: Action, ctx: &TickContext<'_>) -> Action {
        let c = ctx.config;
        match action {
            Action::Eat if self.ripe_flora_in_reach(ctx.flora, c.eat_range).is_none() => {
                Action::SeekFood
            }
            Action::StayInShelter if self.shelter.is_none() => {
                self.feasible(Action::SeekShelter, ctx)
            }
            Action::SeekShelter | Action::StayInShelter if self.stage == LifeStage::Child => {
                Action::Wander
            }
            Action::SeekShelter if self.shelter.is_some() => Action::StayInShelter,
            Action::SeekShelter
                if self
                    .nearest_free_shelter(ctx.shelters, c.shelter_search_radius)
                    .is_none() =>
            {
                Action::Wander
            }
            other => other,
        }
    }

    fn intent_target<R: Rng>(
        &self,
        movement: Option<[f32; 2]>,
        config: &AgentConfig,
        rng: &mut R,
    ) -> Option<(f32, f32)> {
        match movement {
            Some(m) => {
                let (dx, dz) = decode_movement(m, config.max_move);
                Some((self.position.x + dx, self.position.z + dz))
            }
            None => Some(self.random_target(config, rng)),
        }
    }

    fn random_target<R: Rng>(&self, config: &AgentConfig, rng: &mut R) -> (f32, f32) {
        let angle = rng.gen_range(0.0..TAU);
        let distance = if config.wander_min_distance < config.wander_max_distance {
            rng.gen_range(config.wander_min_distance..config.wander_max_distance)
        } else {
            config.wander_max_distance
        };
        (
            self.position.x + angle.cos() * distance,
            self.position.z + angle.sin() * distance,
        )
    }

    /// Change state, leaving the shelter when moving out of `InShelter`
    fn set_state(&mut self, state: AgentState, shelters: &mut [Shelter]) {
        if self.state == AgentState::InShelter && state != AgentState::InShelter {
            self.leave_shelter(shelters);
        }
        self.state = state;
        self.move_target = None;
        self.shelter_target = None;
        if state != AgentState::Eating {
            self.food_target = None;
        }
    }

    fn leave_shelter(&mut self, shelters: &mut [Shelter]) {
        if let Some(id) = self.shelter.take() {
            if let Some(shelter) = shelters.get_mut(id.0) {
                shelter.remove_occupant(self.id);
            }
        }
    }

    #[inline]
    fn step(&self, dt: f32) -> f32 {
        self.genome.traits.speed * dt
    }

    fn act<R: Rng>(&mut self, ctx: &mut TickContext<'_>, rng: &mut R) {
        match self.state {
            AgentState::Wandering => self.wander(ctx, rng),
            AgentState::SeekingFood => self.seek_food(ctx, rng),
            AgentState::Eating => self.eat(ctx, rng),
            AgentState::Resting => {
                let rested = self.stamina >= self.max_stamina * ctx.config.rest_until_fraction;
                if rested && !ctx.is_night {
                    self.set_state(AgentState::Wandering, ctx.shelters);
                }
            }
            AgentState::SeekingShelter => self.seek_shelter(ctx, rng),
            AgentState::InShelter => self.stay_in_shelter(ctx),
        }
    }

    fn move_toward_target<R: Rng>(&mut self, ctx: &TickContext<'_>, rng: &mut R) {
        let (x, z) = match self.move_target {
            Some(target) => target,
            None => {
                let target = self.random_target(ctx.config, rng);
                self.move_target = Some(target);
                target
            }
        };
        if self
            .position
            .step_toward(x, z, self.step(ctx.dt), ctx.config.arrival_distance)
        {
            self.move_target = None;
        }
    }

    fn wander<R: Rng>(&mut self, ctx: &mut TickContext<'_>, rng: &mut R) {
        self.move_toward_target(ctx, rng);

        if self.stamina < ctx.config.tired_stamina {
            self.set_state(AgentState::Resting, ctx.shelters);
        } else if self.hunger < ctx.config.hungry_threshold {
            self.set_state(AgentState::SeekingFood, ctx.shelters);
        }
    }

    fn seek_food<R: Rng>(&mut self, ctx: &mut TickContext<'_>, rng: &mut R) {
        let c = ctx.config;
        let vision = self.genome.traits.vision_range;

        // Re-check the remembered target; someone may have emptied it
        let still_valid = match self.food_target {
            Some(FoodTarget::Flora(id)) => ctx.flora.iter().any(|f| f.id == id && f.has_ripe_fruit()),
            Some(FoodTarget::Fauna(id)) => ctx.fauna.iter().any(|a| a.id == id && a.alive),
            None => false,
        };
        if !still_valid {
            self.food_target = self.preferred_food(ctx, vision).map(|(target, _)| target);
        }

        match self.food_target {
            None => self.set_state(AgentState::Wandering, ctx.shelters),
            Some(FoodTarget::Flora(id)) => {
                let Some(tree) = ctx.flora.iter().find(|f| f.id == id) else {
                    self.food_target = None;
                    return;
                };
                let (tx, tz) = (tree.position.x, tree.position.z);
                self.position.step_toward(tx, tz, self.step(ctx.dt), 0.0);
                if self.position.distance_xz(tx, tz) <= c.eat_range {
                    self.state = AgentState::Eating;
                }
            }
            Some(FoodTarget::Fauna(id)) => self.hunt(id, ctx, rng),
        }
    }

    /// Nearest food in view and its distance. Fauna only counts below the
    /// hunt threshold; between a tree and prey the food preference trait
    /// scales each distance before comparing.
    fn preferred_food(&self, ctx: &TickContext<'_>, vision: f32) -> Option<(FoodTarget, f32)> {
        let tree = self.nearest_ripe_flora(ctx.flora, vision);
        let prey = if self.hunger < ctx.config.hunt_hunger_threshold {
            self.nearest_fauna(ctx.fauna, vision)
        } else {
            None
        };
        match (tree, prey) {
            (Some((t, dt)), Some((p, dp))) => {
                let (flora_weight, fauna_weight) = self.food_weights(ctx.config);
                Some(if dp * fauna_weight < dt * flora_weight {
                    (FoodTarget::Fauna(ctx.fauna[p].id), dp)
                } else {
                    (FoodTarget::Flora(ctx.flora[t].id), dt)
                })
            }
            (Some((t, d)), None) => Some((FoodTarget::Flora(ctx.flora[t].id), d)),
            (None, Some((p, d))) => Some((FoodTarget::Fauna(ctx.fauna[p].id), d)),
            (None, None) => None,
        }
    }

    /// Distance multipliers for (flora, fauna). Preference 0.0 favors
    /// flora, 1.0 favors fauna, 0.5 is neutral.
    fn food_weights(&self, config: &AgentConfig) -> (f32, f32) {
        let preference = self.genome.traits.food_preference.clamp(0.0, 1.0);
        let skew = (preference - 0.5) * config.food_preference_bias;
        (1.0 + skew, 1.0 - skew)
    }

    fn hunt<R: Rng>(&mut self, id: FaunaId, ctx: &mut TickContext<'_>, _rng: &mut R) {
        let c = ctx.config;
        let step = self.step(ctx.dt);
        let Some(prey) = ctx.fauna.iter_mut().find(|a| a.id == id && a.alive) else {
            self.food_target = None;
            return;
        };

        let (px, pz) = (prey.position.x, prey.position.z);
        self.position.step_toward(px, pz, step, 0.0);
        if self.position.distance_xz(px, pz) > c.hunt_range || self.hunt_timer > 0.0 {
            return;
        }

        self.hunt_timer = c.hunt_cooldown;
        if prey.take_damage(c.hunt_damage) {
            self.hunger = (self.hunger + prey.stats().meat_value).min(self.max_hunger);
            self.animals_hunted += 1;
            if self.animals_hunted == 1 {
                self.pending_milestones.push(Milestone::FirstHunt);
            }
            self.food_target = None;
            if self.hunger >= self.max_hunger * c.full_fraction {
                self.set_state(AgentState::Wandering, ctx.shelters);
            }
        }
    }

    fn eat<R: Rng>(&mut self, ctx: &mut TickContext<'_>, rng: &mut R) {
        let c = ctx.config;

        let remembered = match self.food_target {
            Some(FoodTarget::Flora(id)) => ctx.flora.iter().position(|f| {
                f.id == id && f.has_ripe_fruit() && self.position.distance_to(&f.position) <= c.eat_range
            }),
            _ => None,
        };
        let Some(index) = remembered.or_else(|| {
            self.ripe_flora_in_reach(ctx.flora, c.eat_range)
        }) else {
            // Stripped before we got a bite; look elsewhere
            self.food_target = None;
            self.state = AgentState::SeekingFood;
            return;
        };
        self.food_target = Some(FoodTarget::Flora(ctx.flora[index].id));

        let chance = (c.harvest_rate * ctx.dt).min(1.0);
        if rng.gen::<f32>() < chance && ctx.flora[index].harvest_one() {
            self.hunger = (self.hunger + c.fruit_hunger_value).min(self.max_hunger);
            self.fruit_collected += 1;
        }

        if self.hunger >= self.max_hunger * c.full_fraction {
            self.set_state(AgentState::Wandering, ctx.shelters);
        } else if !ctx.flora[index].has_ripe_fruit()
            && self.ripe_flora_in_reach(ctx.flora, c.eat_range).is_none()
        {
            self.food_target = None;
            self.state = AgentState::SeekingFood;
        }
    }

    fn seek_shelter<R: Rng>(&mut self, ctx: &mut TickContext<'_>, rng: &mut R) {
        let c = ctx.config;
        if self.shelter.is_some() {
            self.state = AgentState::InShelter;
            return;
        }

        let target = self
            .shelter_target
            .filter(|id| ctx.shelters.get(id.0).is_some_and(Shelter::has_room))
            .or_else(|| {
                self.nearest_free_shelter(ctx.shelters, c.shelter_search_radius)
                    .map(|(index, _)| ctx.shelters[index].id)
            });
        self.shelter_target = target;

        let Some(id) = target else {
            if ctx.is_night {
                // Keep searching until something frees up
                self.move_toward_target(ctx, rng);
            } else {
                self.set_state(AgentState::Wandering, ctx.shelters);
            }
            return;
        };

        let Some(shelter) = ctx.shelters.get_mut(id.0) else {
            self.shelter_target = None;
            return;
        };
        let (sx, sz) = (shelter.position.x, shelter.position.z);
        self.position.step_toward(sx, sz, self.step(ctx.dt), 0.0);
        if self.position.distance_xz(sx, sz) <= c.shelter_range {
            if shelter.add_occupant(self.id) {
                self.shelter = Some(id);
                self.shelter_target = None;
                self.state = AgentState::InShelter;
                self.position.x = sx;
                self.position.z = sz;
            } else {
                // Filled in the meantime; retry next tick
                self.shelter_target = None;
            }
        }
    }

    fn stay_in_shelter(&mut self, ctx: &mut TickContext<'_>) {
        let Some(id) = self.shelter else {
            self.state = AgentState::SeekingShelter;
            return;
        };
        if let Some(shelter) = ctx.shelters.get(id.0) {
            self.position.x = shelter.position.x;
            self.position.z = shelter.position.z;
        }
        self.hunger = (self.hunger + ctx.config.shelter_hunger_regen * ctx.dt).min(self.max_hunger);
    }

    fn nearest_ripe_flora(&self, flora: &[Flora], range: f32) -> Option<(usize, f32)> {
        flora
            .iter()
            .enumerate()
            .filter(|(_, f)| f.has_ripe_fruit())
            .map(|(i, f)| (i, self.position.distance_to(&f.position)))
            .filter(|&(_, d)| d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn ripe_flora_in_reach(&self, flora: &[Flora], reach: f32) -> Option<usize> {
        self.nearest_ripe_flora(flora, reach).map(|(i, _)| i)
    }

    fn nearest_fauna(&self, fauna: &[Fauna], range: f32) -> Option<(usize, f32)> {
        fauna
            .iter()
            .enumerate()
            .filter(|(_, a)| a.alive)
            .map(|(i, a)| (i, self.position.distance_to(&a.position)))
            .filter(|&(_, d)| d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn nearest_free_shelter(&self, shelters: &[Shelter], range: f32) -> Option<(usize, f32)> {
        shelters
            .iter()
            .enumerate()
            .filter(|(_, s)| s.has_room())
            .map(|(i, s)| (i, s.distance_to(&self.position)))
            .filter(|&(_, d)| d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TerrainConfig};
    use crate::entities::{FloraSpecies, IdAllocator};
    use crate::neural::{Decision, Features as F};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Always returns the same action
    struct Fixed(Action);

    impl DecisionHook for Fixed {
        fn decide(&self, _features: &F) -> Decision {
            Decision::new(self.0)
        }
    }

    struct Fixture {
        config: Config,
        terrain: HeightField,
        flora: Vec<Flora>,
        fauna: Vec<Fauna>,
        shelters: Vec<Shelter>,
        rng: ChaCha8Rng,
        ids: IdAllocator,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = Config::default();
            config.genome.hidden_layers = vec![8];
            Self {
                terrain: HeightField::new(&TerrainConfig::default(), 42).unwrap(),
                config,
                flora: Vec::new(),
                fauna: Vec::new(),
                shelters: Vec::new(),
                rng: ChaCha8Rng::seed_from_u64(42),
                ids: IdAllocator::new(),
            }
        }

        fn adult(&mut self, x: f32, z: f32) -> Agent {
            let genome = Genome::random(&self.config.genome, &mut self.rng);
            let position = Position::on_terrain(x, z, &self.terrain);
            let id = self.ids.next_id();
            Agent::founder(id, genome, position, 0, &self.config.agents, &mut self.rng)
        }

        fn tick(&mut self, agent: &mut Agent, dt: f32, night: bool, hook: Option<&dyn DecisionHook>) {
            self.tick_with(agent, dt, night, false, hook);
        }

        fn tick_with(
            &mut self,
            agent: &mut Agent,
            dt: f32,
            night: bool,
            daybreak: bool,
            hook: Option<&dyn DecisionHook>,
        ) {
            let mut ctx = TickContext {
                dt,
                is_night: night,
                daybreak,
                terrain: &self.terrain,
                flora: &mut self.flora,
                fauna: &mut self.fauna,
                shelters: &mut self.shelters,
                config: &self.config.agents,
                hook,
            };
            agent.update(&mut ctx, &mut self.rng);
        }
    }

    #[test]
    fn test_height_clamped_after_update() {
        let mut fx = Fixture::new();
        let mut agent = fx.adult(3.0, -7.0);
        agent.position.y = 1000.0;
        for _ in 0..50 {
            fx.tick(&mut agent, 0.1, false, None);
            let expected = fx.terrain.height(agent.position.x, agent.position.z);
            assert_eq!(agent.position.y, expected);
        }
    }

    #[test]
    fn test_life_stages_monotonic() {
        let mut fx = Fixture::new();
        fx.config.agents.hunger_decay = 0.0;
        fx.config.agents.health_decay = 0.0;
        let genome = Genome::random(&fx.config.genome, &mut fx.rng);
        let mut agent = Agent::new(AgentId(1), genome, Position::default(), 0, &fx.config.agents, &mut fx.rng);

        let mut seen = vec![agent.stage];
        let mut milestones = Vec::new();
        while agent.alive {
            fx.tick(&mut agent, 5.0, false, None);
            if *seen.last().unwrap() != agent.stage {
                seen.push(agent.stage);
            }
            milestones.extend(agent.take_milestones());
        }
        assert_eq!(seen, vec![LifeStage::Child, LifeStage::Adult, LifeStage::Elder]);
        assert_eq!(milestones, vec![Milestone::BecameAdult, Milestone::BecameElder]);
        assert_eq!(agent.cause_of_death, Some(DeathCause::OldAge));
        assert!(agent.size == agent.genome.traits.size);
    }

    #[test]
    fn test_starvation_kills() {
        let mut fx = Fixture::new();
        let mut agent = fx.adult(0.0, 0.0);
        agent.hunger = 0.0;
        agent.health = 1.0;
        fx.tick(&mut agent, 1.0, false, None);
        assert!(!agent.alive);
        assert_eq!(agent.cause_of_death, Some(DeathCause::Starvation));
    }

    #[test]
    fn test_night_doubles_health_decay() {
        let mut fx = Fixture::new();
        let mut day = fx.adult(0.0, 0.0);
        let mut night = day.clone();
        fx.tick(&mut day, 1.0, false, None);
        fx.tick(&mut night, 1.0, true, None);
        let day_loss = day.max_health - day.health;
        let night_loss = night.max_health - night.health;
        assert!((night_loss - 2.0 * day_loss).abs() < 1e-4);
    }

    #[test]
    fn test_night_forces_shelter_seeking() {
        let mut fx = Fixture::new();
        let mut agent = fx.adult(0.0, 0.0);
        agent.force_state(AgentState::Resting);
        fx.tick(&mut agent, 0.1, true, Some(&Fixed(Action::Rest)));
        assert_eq!(agent.state, AgentState::SeekingShelter);
    }

    #[test]
    fn test_agent_registers_in_shelter() {
        let mut fx = Fixture::new();
        let position = Position::on_terrain(2.0, 0.0, &fx.terrain);
        fx.shelters.push(Shelter::new(ShelterId(0), position, 2));
        let mut agent = fx.adult(0.0, 0.0);
        agent.hunger = 90.0;

        for _ in 0..40 {
            fx.tick(&mut agent, 0.1, true, None);
        }
        assert_eq!(agent.state, AgentState::InShelter);
        assert_eq!(agent.shelter, Some(ShelterId(0)));
        assert!(fx.shelters[0].contains(agent.id));

        fx.tick_with(&mut agent, 0.1, false, true, None);
        assert_eq!(agent.state, AgentState::Wandering);
        assert_eq!(agent.shelter, None);
        assert_eq!(fx.shelters[0].occupant_count(), 0);
    }

    #[test]
    fn test_full_shelter_retries() {
        let mut fx = Fixture::new();
        let position = Position::on_terrain(1.0, 0.0, &fx.terrain);
        let mut shelter = Shelter::new(ShelterId(0), position, 1);
        shelter.add_occupant(AgentId(999));
        fx.shelters.push(shelter);

        let mut agent = fx.adult(0.0, 0.0);
        fx.tick(&mut agent, 0.1, true, None);
        assert_eq!(agent.state, AgentState::SeekingShelter);
        assert_eq!(agent.shelter, None);
        assert_eq!(fx.shelters[0].occupant_count(), 1);
    }

    #[test]
    fn test_eating_harvests_fruit() {
        let mut fx = Fixture::new();
        let mut agent = fx.adult(0.0, 0.0);
        let tree = Flora::new(1, agent.position, FloraSpecies::Apple).with_ripe_fruit(1);
        fx.flora.push(tree);
        agent.hunger = 30.0;
        agent.force_state(AgentState::Eating);

        let hook = Fixed(Action::Eat);
        for _ in 0..100 {
            fx.tick(&mut agent, 0.1, false, Some(&hook));
        }
        assert_eq!(agent.fruit_collected, 1);
        assert_eq!(fx.flora[0].ripe_fruit_count(), 0);
    }

    #[test]
    fn test_infeasible_eat_falls_back_to_seeking() {
        let mut fx = Fixture::new();
        let mut agent = fx.adult(0.0, 0.0);
        agent.hunger = 80.0;
        let hook = Fixed(Action::Eat);
        let dt = agent.decision_timer() + 0.01;
        fx.tick(&mut agent, dt, false, Some(&hook));
        // No ripe flora anywhere: seek, find nothing, wander
        assert_eq!(agent.state, AgentState::Wandering);
        assert_eq!(agent.fruit_collected, 0);
    }

    #[test]
    fn test_children_cannot_choose_shelter() {
        let mut fx = Fixture::new();
        let position = Position::on_terrain(1.0, 0.0, &fx.terrain);
        fx.shelters.push(Shelter::new(ShelterId(0), position, 2));
        let genome = Genome::random(&fx.config.genome, &mut fx.rng);
        let mut child = Agent::new(AgentId(5), genome, Position::default(), 0, &fx.config.agents, &mut fx.rng);
        child.hunger = 90.0;

        let hook = Fixed(Action::SeekShelter);
        let dt = child.decision_timer() + 0.01;
        fx.tick(&mut child, dt, false, Some(&hook));
        assert_eq!(child.state, AgentState::Wandering);
    }

    #[test]
    fn test_hunting_kills_prey() {
        let mut fx = Fixture::new();
        let mut agent = fx.adult(0.0, 0.0);
        agent.hunger = 10.0;
        let prey_position = Position::on_terrain(0.5, 0.0, &fx.terrain);
        let rabbit = Fauna::new(
            9,
            crate::entities::FaunaSpecies::Rabbit,
            prey_position,
            &fx.config.fauna,
            &mut fx.rng,
        );
        fx.fauna.push(rabbit);
        agent.force_state(AgentState::SeekingFood);

        let hook = Fixed(Action::SeekFood);
        for _ in 0..10 {
            fx.tick(&mut agent, 0.1, false, Some(&hook));
        }
        assert!(!fx.fauna[0].alive);
        assert_eq!(agent.animals_hunted, 1);
        assert!(agent.hunger > 10.0);
        assert_eq!(agent.take_milestones(), vec![Milestone::FirstHunt]);
    }

    #[test]
    fn test_reproduction_eligibility() {
        let mut fx = Fixture::new();
        let mut a = fx.adult(0.0, 0.0);
        let mut b = fx.adult(0.0, 0.0);
        assert!(!a.can_reproduce_with(&b), "not sheltered");

        a.shelter = Some(ShelterId(0));
        b.shelter = Some(ShelterId(1));
        assert!(!a.can_reproduce_with(&b), "different shelters");

        b.shelter = Some(ShelterId(0));
        assert!(a.can_reproduce_with(&b));
        assert!(!a.can_reproduce_with(&a.clone()), "not with itself");

        b.reproduction_cooldown = 1.0;
        assert!(!a.can_reproduce_with(&b));
        b.reproduction_cooldown = 0.0;

        b.stage = LifeStage::Elder;
        assert!(!a.can_reproduce_with(&b));
        b.stage = LifeStage::Adult;

        b.alive = false;
        assert!(!a.can_reproduce_with(&b));
    }

    #[test]
    fn test_reproduce_builds_child() {
        let mut fx = Fixture::new();
        let mut a = fx.adult(0.0, 0.0);
        let mut b = fx.adult(0.0, 0.0);
        let spawn = Position::on_terrain(4.0, 4.0, &fx.terrain);
        let child_id = fx.ids.next_id();

        let child = a
            .reproduce(
                &mut b,
                child_id,
                spawn,
                &fx.config.agents,
                &fx.config.genome,
                &fx.config.evolution,
                &mut fx.rng,
            )
            .unwrap();

        assert_eq!(child.age, 0.0);
        assert_eq!(child.stage, LifeStage::Child);
        assert_eq!(child.position, spawn);
        assert_eq!(child.parents, Some((a.id, b.id)));
        assert_eq!(child.name().family, a.name().family);
        assert!(child.size < child.genome.traits.size);
        assert!(child.genome.traits.within_bounds(&fx.config.genome));
        assert!(a.reproduction_cooldown > 0.0 && b.reproduction_cooldown > 0.0);
        assert_eq!(a.take_milestones(), vec![Milestone::HadOffspring]);
    }

    #[test]
    fn test_fitness_rewards_gathering() {
        let mut fx = Fixture::new();
        let agent = fx.adult(0.0, 0.0);
        let mut fed = agent.clone();
        fed.fruit_collected = 3;
        let config = &fx.config.agents;
        assert!((fed.fitness(config) - agent.fitness(config) - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_fitness_counts_time_lived() {
        let mut fx = Fixture::new();
        let genome = Genome::random(&fx.config.genome, &mut fx.rng);
        let config = fx.config.agents.clone();
        let position = Position::on_terrain(0.0, 0.0, &fx.terrain);

        let mut rng_a = ChaCha8Rng::seed_from_u64(1);
        let mut rng_b = ChaCha8Rng::seed_from_u64(2);
        let a = Agent::founder(AgentId(1), genome.clone(), position, 0, &config, &mut rng_a);
        let b = Agent::founder(AgentId(2), genome.clone(), position, 0, &config, &mut rng_b);
        assert_ne!(a.age, b.age);
        assert_eq!(a.fitness(&config), b.fitness(&config));

        let mut survivor = Agent::new(AgentId(3), genome, position, 0, &config, &mut fx.rng);
        survivor.age = 50.0;
        survivor.survival_time = 50.0;
        assert!(survivor.fitness(&config) > a.fitness(&config));

        let mut ticked = a.clone();
        fx.tick(&mut ticked, 1.0, false, None);
        assert!((ticked.survival_time - 1.0).abs() < 1e-6);
        assert!((ticked.age - a.age - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_children_rest_outdoors_at_night() {
        let mut fx = Fixture::new();
        let position = Position::on_terrain(1.0, 0.0, &fx.terrain);
        fx.shelters.push(Shelter::new(ShelterId(0), position, 2));
        let genome = Genome::random(&fx.config.genome, &mut fx.rng);
        let mut child = Agent::new(AgentId(5), genome, Position::default(), 0, &fx.config.agents, &mut fx.rng);
        child.hunger = 90.0;

        for _ in 0..30 {
            fx.tick(&mut child, 0.1, true, None);
            assert_eq!(child.state, AgentState::Resting);
            assert_eq!(child.shelter, None);
        }
        assert_eq!(fx.shelters[0].occupant_count(), 0);
    }

    #[test]
    fn test_food_preference_skews_target() {
        for (preference, expect_fauna) in [(1.0, true), (0.0, false)] {
            let mut fx = Fixture::new();
            let mut agent = fx.adult(0.0, 0.0);
            agent.hunger = 10.0;
            agent.genome.traits.vision_range = 20.0;
            agent.genome.traits.food_preference = preference;

            let tree_position = Position::on_terrain(4.0, 0.0, &fx.terrain);
            fx.flora.push(Flora::new(1, tree_position, FloraSpecies::Apple).with_ripe_fruit(1));
            let prey_position = Position::on_terrain(-4.0, 0.0, &fx.terrain);
            let rabbit = Fauna::new(
                9,
                crate::entities::FaunaSpecies::Rabbit,
                prey_position,
                &fx.config.fauna,
                &mut fx.rng,
            );
            fx.fauna.push(rabbit);
            agent.force_state(AgentState::SeekingFood);

            fx.tick(&mut agent, 0.1, false, Some(&Fixed(Action::SeekFood)));
            let hunting = matches!(agent.food_target, Some(FoodTarget::Fauna(_)));
            assert_eq!(hunting, expect_fauna, "food preference {preference}");
        }
    }

    #[test]
    fn test_eating_stamina_drain_configurable() {
        let mut fx = Fixture::new();
        fx.config.agents.eating_stamina_factor = 0.0;
        let mut agent = fx.adult(0.0, 0.0);
        fx.flora.push(Flora::new(1, agent.position, FloraSpecies::Apple).with_ripe_fruit(5));
        agent.hunger = 20.0;
        agent.stamina = 40.0;
        agent.force_state(AgentState::Eating);

        fx.tick(&mut agent, 0.1, false, Some(&Fixed(Action::Eat)));
        assert_eq!(agent.state, AgentState::Eating);
        assert_eq!(agent.stamina, 40.0);
    }
}
