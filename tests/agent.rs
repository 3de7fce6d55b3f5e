use screeps::{Part, RoomName, StructureType};
use screeps_tasker::features::*;
use screeps_tasker::game_loop::*;
use screeps_tasker::memory::*;
use screeps_tasker::room::buildqueue::*;
use screeps_tasker::sandbox::*;
use screeps_tasker::tasks::data::ActionVerb;
use screeps_tasker::unit::*;
use screeps_tasker::world::*;
use serde_json::json;

fn room() -> RoomName {
    RoomName::new("W1N1").unwrap()
}

fn memory_with_features(features: serde_json::Value) -> JsonMemory {
    let mut memory = JsonMemory::new();
    memory.set(FEATURES_KEY, features);
    memory
}

#[test]
fn spawned_harvester_walks_to_its_source_and_harvests() {
    let mut world = SandboxWorld::new(room());
    world.set_controller(40, 40, 1);
    world.add_structure(StructureType::Spawn, 25, 25, Some(Store::new(300, 300)));
    world.add_source(10, 10, 3000);

    let mut memory = memory_with_features(json!({ "construction": false }));
    let mut agent = Agent::default();

    let first = agent.tick(&mut world, &mut memory);

    assert_eq!(first.spawned.len(), 1);

    let name = first.spawned[0].clone();

    assert!(name.starts_with("harvester-"));
    assert_eq!(memory.get(&unit_path(&name, ROLE_KEY)), Some(json!("harvester")));
    assert_eq!(world.unit(&name).map(|u| u.body), Some(vec![Part::Work, Part::Carry, Part::Move]));

    let mut assigned = 0;
    let mut errors = 0;
    let mut persisted_task = false;

    for _ in 0..60 {
        world.advance();

        let summary = agent.tick(&mut world, &mut memory);

        assigned += summary.assigned;
        errors += summary.errors;

        if let Some(serde_json::Value::Array(tasks)) = memory.get(&unit_path(&name, TASK_KEY)) {
            persisted_task |= !tasks.is_empty();
        }
    }

    assert_eq!(errors, 0);
    assert!(assigned >= 1);
    assert!(world
        .actions
        .iter()
        .any(|a| a.unit == name && a.verb == ActionVerb::Harvest && a.code == ActionCode::Ok));
    assert_eq!(memory.get(&unit_path(&name, ROLE_KEY)), Some(json!("harvester")));
    assert!(persisted_task);
}

#[test]
fn memory_of_dead_units_is_collected() {
    let mut world = SandboxWorld::new(room());
    world.set_controller(40, 40, 1);
    world.add_unit("alive", 20, 20, &[Part::Work, Part::Carry, Part::Move], 0);

    let mut memory = memory_with_features(json!({ "construction": false, "spawning": false }));
    memory.set("creeps.alive.role", json!("harvester"));
    memory.set("creeps.ghost.role", json!("harvester"));

    let summary = Agent::default().tick(&mut world, &mut memory);

    assert_eq!(summary.collected, 1);
    assert!(memory.get("creeps.ghost").is_none());
    assert_eq!(memory.get("creeps.alive.role"), Some(json!("harvester")));
}

#[test]
fn unit_failures_do_not_stop_the_room() {
    let mut world = SandboxWorld::new(room());
    world.set_controller(40, 40, 1);
    world.add_source(10, 12, 3000);
    world.add_unit("lost", 30, 30, &[Part::Work, Part::Carry, Part::Move], 0);
    world.add_unit("alive", 10, 11, &[Part::Work, Part::Carry, Part::Move], 0);

    let mut memory = memory_with_features(json!({ "construction": false, "spawning": false }));
    memory.set("creeps.alive.role", json!("harvester"));

    let summary = Agent::default().tick(&mut world, &mut memory);

    assert_eq!(summary.units, 2);
    assert_eq!(summary.errors, 1);
    assert!(world.actions.iter().any(|a| a.unit == "alive" && a.verb == ActionVerb::Harvest));
}

#[test]
fn build_queue_places_sites_up_to_the_limit() {
    let mut world = SandboxWorld::new(room());
    world.set_controller(40, 40, 2);
    world.add_structure(StructureType::Spawn, 25, 25, Some(Store::new(300, 300)));
    world.add_source(10, 10, 3000);

    let mut memory = memory_with_features(json!({ "spawning": false }));
    let mut agent = Agent::default();

    let summary = agent.tick(&mut world, &mut memory);

    let sites = world.construction_sites(room());

    assert_eq!(summary.sites_placed, 5);
    assert_eq!(sites.len(), 5);
    assert!(sites.iter().all(|s| s.structure_type == StructureType::Extension));

    let queue = BuildQueue::load(&memory, room()).unwrap();

    assert_eq!(queue.level, 2);
    assert!(queue.requests.iter().any(|r| r.structure_type == StructureType::Road));
    assert!(queue.requests.iter().all(|r| sites.iter().all(|s| s.pos != r.pos)));

    world.advance();

    let again = agent.tick(&mut world, &mut memory);

    assert_eq!(again.sites_placed, 0);
    assert_eq!(world.construction_sites(room()).len(), 5);
}

#[test]
fn reset_flag_clears_memory_once() {
    let mut world = SandboxWorld::new(room());
    world.set_controller(40, 40, 1);

    let mut memory = memory_with_features(json!({ "reset_memory": true, "construction": false, "spawning": false }));
    memory.set("creeps.ghost.role", json!("hauler"));
    memory.set("rooms.W1N1.note", json!(1));

    Agent::default().tick(&mut world, &mut memory);

    assert!(!Features::load(&memory).reset_memory);
    assert!(memory.get("creeps.ghost").is_none());
    assert!(memory.get("rooms.W1N1.note").is_none());
}

#[test]
fn configuration_is_reloaded_when_it_changes() {
    let mut world = SandboxWorld::new(room());
    world.set_controller(40, 40, 1);

    let mut memory = memory_with_features(json!({ "construction": false, "spawning": false }));
    memory.set(CONFIG_KEY, json!({ "pathing": { "stuck_threshold": 9 } }));

    let mut agent = Agent::default();

    agent.tick(&mut world, &mut memory);
    assert_eq!(agent.config().pathing.stuck_threshold, 9);

    memory.set(CONFIG_KEY, json!({ "pathing": { "stuck_threshold": 3 }, "roles": [] }));
    world.advance();

    agent.tick(&mut world, &mut memory);
    assert_eq!(agent.config().pathing.stuck_threshold, 3);
    assert!(agent.config().roles.is_empty());
}

#[test]
fn rooms_without_an_owned_controller_are_skipped() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("visitor", 20, 20, &[Part::Move], 0);

    let mut memory = JsonMemory::new();

    let summary = Agent::default().tick(&mut world, &mut memory);

    assert_eq!(summary.rooms, 0);
    assert_eq!(summary.units, 0);
    assert!(world.moves.is_empty());
}
