//! Integration tests for HEARTHWILD

use hearthwild::entities::{Flora, FloraSpecies, Position};
use hearthwild::genetics::Genome;
use hearthwild::stats::StatsHistory;
use hearthwild::{
    Agent, AgentId, AgentState, Config, EvolutionEngine, HeightField, LifeStage, SimEvent, World,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

fn small_config(seed: u64) -> Config {
    let mut config = Config::default();
    config.world.seed = seed;
    config.world.initial_flora = 15;
    config.world.initial_fauna = 8;
    config.world.initial_shelters = 4;
    config.evolution.population_size = 12;
    config
}

fn place_founder(world: &mut World, x: f32, z: f32, seed: u64) -> AgentId {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let genome = Genome::random(&world.config.genome, &mut rng);
    let id = world.next_agent_id();
    let agent = Agent::founder(
        id,
        genome,
        Position::new(x, 0.0, z),
        0,
        &world.config.agents,
        &mut rng,
    );
    world.add_agent(agent)
}

#[test]
fn test_height_deterministic_across_worlds() {
    let a = World::empty(small_config(42)).unwrap();
    let b = World::empty(small_config(42)).unwrap();
    let c = World::empty(small_config(43)).unwrap();

    let points = [(0.0, 0.0), (12.5, -7.25), (-300.0, 411.0), (63.99, 64.01)];
    for &(x, z) in &points {
        assert_eq!(a.height_at(x, z), b.height_at(x, z));
        assert_eq!(a.height_at(x, z), a.height_at(x, z));
    }
    assert!(points
        .iter()
        .any(|&(x, z)| a.height_at(x, z) != c.height_at(x, z)));
}

#[test]
fn test_no_seams_across_chunk_boundaries() {
    let config = small_config(42);
    let terrain = HeightField::new(&config.terrain, 42).unwrap();
    let size = terrain.chunk_size() as f32;
    let step = 0.25;
    // Generous slope bound for the default noise layers
    let bound = terrain.max_height() * 0.2 * step;

    for boundary in [-size, 0.0, size, 2.0 * size] {
        for i in 0..40 {
            let along = i as f32 * 3.1 - 60.0;
            let before = terrain.height(boundary - step / 2.0, along);
            let after = terrain.height(boundary + step / 2.0, along);
            assert!(
                (before - after).abs() <= bound,
                "seam at x={boundary}, z={along}: {before} vs {after}"
            );
            let before = terrain.height(along, boundary - step / 2.0);
            let after = terrain.height(along, boundary + step / 2.0);
            assert!((before - after).abs() <= bound);
        }
    }
}

#[test]
fn test_eating_at_noon_collects_fruit() {
    let mut world = World::empty(small_config(42)).unwrap();
    world.set_hour(12.0);

    let tree = Flora::new(0, Position::new(0.0, 0.0, 0.0), FloraSpecies::Apple).with_ripe_fruit(1);
    world.add_flora(tree);
    let id = place_founder(&mut world, 0.0, 0.0, 42);
    {
        let agent = world.agent_mut(id).unwrap();
        agent.hunger = 30.0;
        agent.force_state(AgentState::Eating);
    }

    for _ in 0..100 {
        world.update(0.1);
    }

    let agent = world.agent(id).unwrap();
    let ripe: usize = world.flora().iter().map(Flora::ripe_fruit_count).sum();
    assert!(agent.fruit_collected > 0 || ripe < 1);
}

#[test]
fn test_night_far_from_shelter_seeks_shelter() {
    for prior in [
        AgentState::Wandering,
        AgentState::SeekingFood,
        AgentState::Eating,
        AgentState::Resting,
        AgentState::SeekingShelter,
    ] {
        let mut world = World::empty(small_config(7)).unwrap();
        world.add_shelter(150.0, 0.0);
        let id = place_founder(&mut world, 0.0, 0.0, 7);
        world.agent_mut(id).unwrap().force_state(prior);
        world.set_hour(22.0);
        assert!(world.is_night());

        world.update(0.1);
        assert_eq!(
            world.agent(id).unwrap().state,
            AgentState::SeekingShelter,
            "prior state {prior:?}"
        );
    }
}

#[test]
fn test_sheltered_pair_produces_child() {
    let mut config = small_config(11);
    config.agents.reproduction_chance_per_second = 0.5;
    let mut world = World::empty(config).unwrap();
    let shelter = world.add_shelter(10.0, 10.0);
    let a = place_founder(&mut world, 10.0, 10.0, 1);
    let b = place_founder(&mut world, 10.0, 10.0, 2);
    world.set_hour(20.0);

    world.update(0.1);
    assert_eq!(world.agent(a).unwrap().shelter, Some(shelter));
    assert_eq!(world.agent(b).unwrap().shelter, Some(shelter));

    let newborn = |world: &World| world.agents().iter().find(|x| x.parents.is_some()).cloned();
    let mut child = newborn(&world);
    for _ in 0..400 {
        if child.is_some() {
            break;
        }
        world.update(0.1);
        child = newborn(&world);
    }

    let child = child.expect("a sheltered pair should reproduce");
    assert_eq!(child.age, 0.0);
    assert_eq!(child.stage, LifeStage::Child);
    assert_eq!(child.parents, Some((a, b)));
    assert_eq!(world.agent(a).unwrap().offspring_count, 1);
    assert!(world.agent(a).unwrap().reproduction_cooldown > 0.0);
    assert!(world
        .events()
        .iter()
        .any(|e| matches!(e, SimEvent::Reproduction { child: c, .. } if *c == child.id)));
}

#[test]
fn test_elitism_preserved_across_generation() {
    let mut config = small_config(5);
    config.evolution.population_size = 10;
    let mut engine = EvolutionEngine::from_config(&config);
    let mut world = World::new(config).unwrap();

    let elite_id = world.agents()[3].id;
    let elite_genome = world.agents()[3].genome.clone();
    world.agent_mut(elite_id).unwrap().fruit_collected = 10_000;

    world.advance_generation(&mut engine).unwrap();
    assert_eq!(world.population(), 10);
    assert!(world.agents().iter().any(|a| a.genome == elite_genome));
    assert!(world.agent(elite_id).is_none(), "outgoing agents are replaced");
}

#[test]
fn test_full_simulation_cycle() {
    let mut config = small_config(12345);
    config.evolution.generation_duration = 30.0;
    let mut engine = EvolutionEngine::from_config(&config);
    let mut world = World::new(config).unwrap();
    let mut stages: HashMap<AgentId, LifeStage> = HashMap::new();

    for _ in 0..1000 {
        world.update_with_evolution(0.1, &mut engine).unwrap();

        for agent in world.agents() {
            assert!(agent.alive, "dead agents are pruned within the tick");
            assert!(agent.health > 0.0);
            assert_eq!(agent.position.y, world.height_at(agent.position.x, agent.position.z));
            assert!(agent.genome.traits.within_bounds(&world.config.genome));
            if let Some(previous) = stages.insert(agent.id, agent.stage) {
                assert!(agent.stage >= previous, "life stage regressed");
            }
        }
        for shelter in world.shelters() {
            assert!(shelter.occupant_count() <= shelter.capacity);
        }
    }

    assert!(world.generation() >= 3);
    assert!((world.time() - 100.0).abs() < 0.01);
}

#[test]
fn test_stats_history_export() {
    let mut world = World::new(small_config(99)).unwrap();
    world.run(60.0, 0.1);

    let series = world.stats_history.population_series();
    assert!(series.len() >= 6);

    let path = std::env::temp_dir().join("hearthwild_stats_history.json");
    let path = path.to_string_lossy();
    world.stats_history.save(&path).expect("Failed to save stats");
    let loaded = StatsHistory::load(&path).expect("Failed to load stats");
    assert_eq!(loaded.snapshots.len(), world.stats_history.snapshots.len());
    let _ = std::fs::remove_file(path.as_ref());
}

#[test]
fn test_config_file_roundtrip() {
    let mut config = small_config(3);
    config.agents.hungry_threshold = 42.0;
    let path = std::env::temp_dir().join("hearthwild_config_test.yaml");

    config.save(&path).expect("Failed to save config");
    let loaded = Config::from_file(&path).expect("Failed to load config");
    assert_eq!(loaded.world.seed, 3);
    assert_eq!(loaded.agents.hungry_threshold, 42.0);
    let _ = std::fs::remove_file(&path);
}
