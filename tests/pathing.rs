use proptest::prelude::*;
use screeps::{Direction, Part, Position, RoomName, Terrain};
use screeps_tasker::constants::*;
use screeps_tasker::location::*;
use screeps_tasker::memory::*;
use screeps_tasker::pathing::*;
use screeps_tasker::sandbox::*;
use screeps_tasker::world::*;

fn room() -> RoomName {
    RoomName::new("W1N1").unwrap()
}

fn travel(world: &mut SandboxWorld, name: &str, state: &mut Option<TravelState>, target: Position, range: u32) -> MovementResult {
    travel_with(world, name, state, target, range, &TrafficSnapshot::new(), None)
}

fn travel_with(
    world: &mut SandboxWorld,
    name: &str,
    state: &mut Option<TravelState>,
    target: Position,
    range: u32,
    traffic: &TrafficSnapshot,
    visualizer: Option<&mut RecordingVisualizer>,
) -> MovementResult {
    let base = CostMatrixBuilder::build(&*world, room(), &CostWeights::default());
    let mut pathfinder = GridPathfinder::new();
    let config = PathingConfig::default();
    let overlay = OverlayOptions::default();
    let unit = world.unit(name).unwrap();

    let mut traveler = Traveler {
        tick: world.time(),
        base: &base,
        controller: None,
        traffic,
        pathfinder: &mut pathfinder,
        config: &config,
        overlay: &overlay,
        visualizer: visualizer.map(|v| v as &mut dyn MovementVisualizer),
    };

    traveler.travel_to(world, &unit, state, target, range)
}

/// Travels with an explicit unit snapshot, which may be stale relative to
/// the world, and an explicit pathfinder and configuration.
#[allow(clippy::too_many_arguments)]
fn travel_as(
    world: &mut SandboxWorld,
    unit: &UnitInfo,
    state: &mut Option<TravelState>,
    target: Position,
    range: u32,
    traffic: &TrafficSnapshot,
    config: &PathingConfig,
    pathfinder: &mut dyn PathfindingProvider,
) -> MovementResult {
    let base = CostMatrixBuilder::build(&*world, room(), &CostWeights::default());
    let overlay = OverlayOptions::default();

    let mut traveler = Traveler {
        tick: world.time(),
        base: &base,
        controller: None,
        traffic,
        pathfinder,
        config,
        overlay: &overlay,
        visualizer: None,
    };

    traveler.travel_to(world, unit, state, target, range)
}

#[derive(Default)]
struct CountingPathfinder {
    inner: GridPathfinder,
    searches: u32,
}

impl PathfindingProvider for CountingPathfinder {
    fn search(
        &mut self,
        origin: Position,
        goal: Position,
        range: u32,
        room_callback: &mut dyn FnMut(RoomName) -> Option<CostMatrix>,
        max_ops: u32,
        max_rooms: u32,
    ) -> PathfindingResult {
        self.searches += 1;

        self.inner.search(origin, goal, range, room_callback, max_ops, max_rooms)
    }
}

fn count_searches(config: &PathingConfig, moves: usize) -> u32 {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);

    let target = world.pos(10, 20);
    let traffic = TrafficSnapshot::new();
    let mut pathfinder = CountingPathfinder::default();
    let mut state = None;

    for _ in 0..moves {
        let unit = world.unit("mover").unwrap();

        assert_eq!(
            travel_as(&mut world, &unit, &mut state, target, 0, &traffic, config, &mut pathfinder),
            MovementResult::Moving
        );

        world.advance();
    }

    pathfinder.searches
}

#[test]
fn first_step_is_issued_and_stored() {
    let mut world = SandboxWorld::new(room());
    let source = world.add_source(10, 13, 3000);
    world.add_unit("mover", 10, 10, &[Part::Move], 0);

    let target = world.get_object(&source).unwrap().pos();
    let mut state = None;

    let result = travel(&mut world, "mover", &mut state, target, 1);

    assert_eq!(result, MovementResult::Moving);

    let state = state.unwrap();
    assert_eq!(state.path, "5");
    assert_eq!(state.distance_remaining, 1);
    assert_eq!(state.destination, world.pos(10, 12));
    assert_eq!(world.moves.len(), 1);
    assert_eq!(world.moves[0].direction, Direction::Bottom);
}

#[test]
fn travel_arrives_and_clears_state() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);

    let target = world.pos(14, 10);
    let mut state = None;

    for _ in 0..4 {
        assert_eq!(travel(&mut world, "mover", &mut state, target, 0), MovementResult::Moving);
        world.advance();
    }

    assert_eq!(world.unit("mover").map(|u| u.pos), Some(target));
    assert_eq!(travel(&mut world, "mover", &mut state, target, 0), MovementResult::Arrived);
    assert!(state.is_none());
}

#[test]
fn stuck_counter_grows_while_blocked_and_resets_on_progress() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);
    let blocker = world.add_hostile("blocker", 10, 11, &[Part::Move]);

    let target = world.pos(10, 20);
    let mut state = None;
    let mut counters = Vec::new();

    for _ in 0..4 {
        travel(&mut world, "mover", &mut state, target, 0);
        counters.push(state.as_ref().unwrap().stuck_counter);
        world.advance();
    }

    assert_eq!(counters, vec![0, 1, 2, 3]);

    world.remove_object(&blocker);

    travel(&mut world, "mover", &mut state, target, 0);
    world.advance();

    assert_eq!(world.unit("mover").map(|u| u.pos), Some(world.pos(10, 11)));
    assert_eq!(travel(&mut world, "mover", &mut state, target, 0), MovementResult::Moving);
    assert_eq!(state.unwrap().stuck_counter, 0);
}

#[test]
fn travel_is_abandoned_after_twice_the_threshold() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);
    world.add_hostile("blocker", 10, 11, &[Part::Move]);

    let target = world.pos(10, 20);
    let threshold = PathingConfig::default().stuck_threshold;
    let mut state = None;
    let mut results = Vec::new();

    for _ in 0..(threshold * 2 + 2) {
        results.push(travel(&mut world, "mover", &mut state, target, 0));
        world.advance();
    }

    let timeout = results
        .iter()
        .position(|r| matches!(r, MovementResult::Failed(MovementFailure::StuckTimeout { .. })))
        .unwrap();

    assert_eq!(timeout as u32, threshold * 2 + 1);
    assert_eq!(
        results[timeout],
        MovementResult::Failed(MovementFailure::StuckTimeout { ticks: threshold * 2 + 1 })
    );
    assert!(results[1..timeout].iter().all(|r| matches!(r, MovementResult::Stuck { .. })));
}

#[test]
fn enclosed_target_reports_path_not_found() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);

    for (dx, dy) in ONE_OFFSET_SQUARE {
        world.set_terrain((30 + dx) as u8, (30 + dy) as u8, Terrain::Wall);
    }

    let target = world.pos(30, 30);
    let mut state = None;
    let mut visualizer = RecordingVisualizer::default();

    let result = travel_with(&mut world, "mover", &mut state, target, 0, &TrafficSnapshot::new(), Some(&mut visualizer));

    assert_eq!(result, MovementResult::Failed(MovementFailure::PathNotFound));
    assert_eq!(state.map(|s| s.stuck_counter), Some(1));
    assert_eq!(visualizer.failed, vec![world.pos(10, 10)]);
    assert!(world.moves.is_empty());
}

#[test]
fn parked_units_are_routed_around() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);
    world.add_unit("parked", 10, 11, &[Part::Move], 0);

    let mut traffic = TrafficSnapshot::new();
    traffic.update(UnitTraffic {
        name: "parked".to_string(),
        pos: world.pos(10, 11),
        path: None,
        destination: None,
        has_task: false,
    });

    let target = world.pos(10, 14);
    let mut state = None;

    let result = travel_with(&mut world, "mover", &mut state, target, 0, &traffic, None);

    assert_eq!(result, MovementResult::Moving);
    assert_ne!(world.moves[0].direction, Direction::Bottom);

    let next = step(world.pos(10, 10), world.moves[0].direction).unwrap();
    let route = walk_path(next, &state.unwrap().path);

    assert!(!route.contains(&world.pos(10, 11)));
    assert_eq!(route.last(), Some(&target));
}

#[test]
fn parked_unit_on_the_destination_forces_a_replan() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);

    let target = world.pos(10, 15);
    let mut state = None;

    assert_eq!(travel(&mut world, "mover", &mut state, target, 1), MovementResult::Moving);

    let planned = state.as_ref().map(|s| s.destination).unwrap();
    let (px, py) = coords(planned);

    world.advance();
    world.add_unit("parked", px, py, &[Part::Move], 0);

    let mut traffic = TrafficSnapshot::new();
    traffic.update(UnitTraffic {
        name: "parked".to_string(),
        pos: planned,
        path: None,
        destination: None,
        has_task: false,
    });

    assert_eq!(
        travel_with(&mut world, "mover", &mut state, target, 1, &traffic, None),
        MovementResult::Moving
    );

    let state = state.unwrap();

    assert_ne!(state.destination, planned);
    assert!(in_range(state.destination, target, 1));
    let from = world.unit("mover").unwrap().pos;
    let next = step(from, world.moves.last().unwrap().direction).unwrap();

    assert_ne!(next, planned);
    assert!(!walk_path(next, &state.path).contains(&planned));
}

#[test]
fn cached_path_is_reused_between_moves() {
    assert_eq!(count_searches(&PathingConfig::default(), 3), 1);
}

#[test]
fn disabling_the_cache_replans_every_move() {
    let config = PathingConfig {
        use_cache: false,
        ..PathingConfig::default()
    };

    assert_eq!(count_searches(&config, 3), 3);
}

#[test]
fn tired_move_keeps_the_cached_path() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);

    let target = world.pos(10, 20);
    let traffic = TrafficSnapshot::new();
    let config = PathingConfig::default();
    let mut pathfinder = CountingPathfinder::default();
    let mut state = None;

    let unit = world.unit("mover").unwrap();
    travel_as(&mut world, &unit, &mut state, target, 0, &traffic, &config, &mut pathfinder);
    world.advance();

    let before = state.clone().unwrap();

    // The snapshot predates the fatigue, so only the move itself reports it.
    let stale = world.unit("mover").unwrap();
    world.unit_mut("mover").unwrap().fatigue = 2;

    let result = travel_as(&mut world, &stale, &mut state, target, 0, &traffic, &config, &mut pathfinder);

    let after = state.unwrap();

    assert_eq!(result, MovementResult::Tired);
    assert_eq!(after.path, before.path);
    assert_eq!(after.destination, before.destination);
    assert_eq!(after.stuck_counter, 0);
    assert_eq!(pathfinder.searches, 1);
    assert_eq!(world.moves.len(), 1);
}

#[test]
fn fatigued_unit_is_tired_without_touching_state() {
    let mut world = SandboxWorld::new(room());
    world.add_unit("mover", 10, 10, &[Part::Move], 0);

    let target = world.pos(10, 20);
    let mut state = None;

    travel(&mut world, "mover", &mut state, target, 0);
    world.advance();
    world.unit_mut("mover").unwrap().fatigue = 4;

    let before = state.clone();

    assert_eq!(travel(&mut world, "mover", &mut state, target, 0), MovementResult::Tired);
    assert_eq!(state, before);
    assert_eq!(world.moves.len(), 1);
}

#[test]
fn terrain_layer_is_restored_from_memory() {
    let mut world = SandboxWorld::new(room());
    world.set_terrain(20, 20, Terrain::Swamp);

    let weights = CostWeights::default();
    let mut memory = JsonMemory::new();

    let mut system = CostMatrixSystem::new();
    let computed = system.terrain_layer(&world, &memory, room(), &weights);
    system.flush_storage(&mut memory);

    assert!(memory.get(&room_path(room(), TERRAIN_MATRIX_KEY)).is_some());

    // Terrain never changes in a real room; a changed sandbox shows the
    // stored layer is used instead of being recomputed.
    world.set_terrain(20, 20, Terrain::Plain);

    let mut reloaded = CostMatrixSystem::new();
    let restored = reloaded.terrain_layer(&world, &memory, room(), &weights);

    assert_eq!(restored.bits(), computed.bits());
    assert_eq!(restored.get(20, 20), weights.swamp);

    let reweighted = CostWeights {
        swamp: 20,
        ..CostWeights::default()
    };

    let mut recomputed = CostMatrixSystem::new();
    let layer = recomputed.terrain_layer(&world, &memory, room(), &reweighted);

    assert_eq!(layer.get(20, 20), reweighted.plain);
}

#[test]
fn base_matrix_is_shared_until_invalidated() {
    let mut world = SandboxWorld::new(room());
    let memory = JsonMemory::new();
    let weights = CostWeights::default();
    let mut system = CostMatrixSystem::new();

    let first = system.base_matrix(&world, &memory, room(), &weights, 10);
    world.add_construction_site(screeps::StructureType::Extension, 15, 15, 3000);
    let second = system.base_matrix(&world, &memory, room(), &weights, 10);

    assert!(std::rc::Rc::ptr_eq(&first, &second));

    system.invalidate(room());
    let rebuilt = system.base_matrix(&world, &memory, room(), &weights, 10);

    assert_eq!(rebuilt.get(15, 15), COST_MATRIX_BLOCKED);
}

#[test]
fn reweighting_rebuilds_the_cached_base_matrix() {
    let mut world = SandboxWorld::new(room());
    world.set_terrain(20, 20, Terrain::Swamp);

    let mut memory = JsonMemory::new();
    let mut system = CostMatrixSystem::new();

    let before = system.base_matrix(&world, &memory, room(), &CostWeights::default(), 10);
    system.flush_storage(&mut memory);

    assert_eq!(before.get(20, 20), CostWeights::default().swamp);

    world.advance();

    let reweighted = CostWeights {
        swamp: 20,
        ..CostWeights::default()
    };

    let after = system.base_matrix(&world, &memory, room(), &reweighted, 10);

    assert_eq!(after.get(20, 20), 20);

    system.flush_storage(&mut memory);

    let mut reloaded = CostMatrixSystem::new();

    assert_eq!(reloaded.terrain_layer(&world, &memory, room(), &reweighted).get(20, 20), 20);
}

fn terrain_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0u8..3, ROOM_AREA)
}

fn sandbox_with_terrain(terrain: &[u8]) -> SandboxWorld {
    let mut world = SandboxWorld::new(room());

    for (index, kind) in terrain.iter().enumerate() {
        let x = (index % ROOM_SIZE as usize) as u8;
        let y = (index / ROOM_SIZE as usize) as u8;

        let terrain = match kind {
            0 => Terrain::Plain,
            1 => Terrain::Swamp,
            _ => Terrain::Wall,
        };

        world.set_terrain(x, y, terrain);
    }

    world
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn cost_matrix_build_is_deterministic(terrain in terrain_strategy(), sx in 1u8..49, sy in 1u8..49) {
        let mut world = sandbox_with_terrain(&terrain);
        world.add_source(sx, sy, 3000);

        let weights = CostWeights::default();

        let first = CostMatrixBuilder::build(&world, room(), &weights);
        let second = CostMatrixBuilder::build(&world, room(), &weights);

        prop_assert_eq!(first.bits(), second.bits());
        prop_assert_eq!(first.get(sx, sy), COST_MATRIX_BLOCKED);

        for (index, kind) in terrain.iter().enumerate() {
            if *kind == 2 {
                prop_assert_eq!(first.bits()[index], COST_MATRIX_BLOCKED);
            }
        }
    }

    #[test]
    fn overlay_ignores_the_mover(
        others in proptest::collection::vec((1u8..49, 1u8..49, any::<bool>(), 0u8..8), 0..6),
        mx in 1u8..49,
        my in 1u8..49,
    ) {
        let base = CostMatrix::from_bits(vec![2; ROOM_AREA]).unwrap();
        let mover_pos = make_position(mx, my, room()).unwrap();

        let mut without_mover = TrafficSnapshot::new();

        for (index, (x, y, moving, code)) in others.iter().enumerate() {
            let pos = make_position(*x, *y, room()).unwrap();
            let path = char::from_digit(*code as u32 + 1, 10).map(|c| c.to_string());

            without_mover.update(UnitTraffic {
                name: format!("unit-{}", index),
                pos,
                path: if *moving { path } else { None },
                destination: if *moving { Some(pos) } else { None },
                has_task: *moving,
            });
        }

        let mut with_mover = without_mover.clone();
        with_mover.update(UnitTraffic {
            name: "mover".to_string(),
            pos: mover_pos,
            path: Some("1".to_string()),
            destination: Some(mover_pos),
            has_task: true,
        });

        let options = OverlayOptions::default();

        let expected = overlay_traffic(&base, "mover", mover_pos, &without_mover, None, &options);
        let actual = overlay_traffic(&base, "mover", mover_pos, &with_mover, None, &options);

        prop_assert_eq!(actual.bits(), expected.bits());
        prop_assert!(base.bits().iter().all(|c| *c == 2));
    }
}

proptest! {
    #[test]
    fn stuck_counter_tracks_unchanged_positions(moves in proptest::collection::vec(any::<bool>(), 1..40)) {
        let start = make_position(10, 10, room()).unwrap();
        let target = make_position(40, 10, room()).unwrap();
        let mut state = TravelState::new(start, target, 0);
        let mut current = start;

        for moved in moves {
            let before = state.stuck_counter;

            if moved {
                current = step(current, Direction::Right).unwrap();
            }

            prop_assert_eq!(state.observe(current), moved);

            if moved {
                prop_assert_eq!(state.stuck_counter, 0);
            } else {
                prop_assert_eq!(state.stuck_counter, before + 1);
            }

            state.last_position = current;
        }
    }
}
