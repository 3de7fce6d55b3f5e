use crate::cache::*;
use crate::config::*;
use crate::features::*;
use crate::logging;
use crate::memory::*;
use crate::pathing::*;
use crate::room::buildqueue::*;
use crate::room::snapshot::*;
use crate::spawn;
use crate::tasks::assignment::*;
use crate::tasks::capacity::*;
use crate::tasks::context::*;
use crate::tasks::execution::*;
use crate::unit::*;
use crate::world::*;
use log::*;
use screeps::{Position, RoomName};
use serde_json::Value;
use std::collections::HashSet;
use std::rc::Rc;

/// Counters for one tick, logged at debug level when the tick ends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickSummary {
    pub tick: u32,
    pub rooms: u32,
    pub units: u32,
    pub assigned: u32,
    pub executed: u32,
    pub removed: u32,
    pub abandoned: u32,
    pub spawned: Vec<String>,
    pub sites_placed: u32,
    pub collected: u32,
    pub errors: u32,
}

struct RoomContext<'a> {
    snapshot: &'a RoomSnapshot,
    base: &'a CostMatrix,
    controller: Option<Position>,
}

pub struct Agent {
    config: AgentConfig,
    config_source: Option<Value>,
    costs: CostMatrixSystem,
    cache: TickCache,
    pathfinder: Box<dyn PathfindingProvider>,
    visualizer: Option<Box<dyn MovementVisualizer>>,
}

impl Default for Agent {
    fn default() -> Agent {
        Agent::new(AgentConfig::default())
    }
}

impl Agent {
    pub fn new(config: AgentConfig) -> Agent {
        Agent {
            config,
            config_source: None,
            costs: CostMatrixSystem::new(),
            cache: TickCache::new(),
            pathfinder: Box::new(GridPathfinder::new()),
            visualizer: None,
        }
    }

    pub fn with_pathfinder(mut self, pathfinder: Box<dyn PathfindingProvider>) -> Agent {
        self.pathfinder = pathfinder;
        self
    }

    pub fn with_visualizer(mut self, visualizer: Box<dyn MovementVisualizer>) -> Agent {
        self.visualizer = Some(visualizer);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Re-reads `_config` when its stored value changed since the last tick.
    fn refresh_config(&mut self, memory: &dyn MemoryStore) {
        let source = memory.get(CONFIG_KEY);

        if source.is_some() && source != self.config_source {
            self.config = AgentConfig::load(memory);
            self.config_source = source;

            info!("Loaded configuration with {} roles", self.config.roles.len());
        }
    }

    pub fn tick<G>(&mut self, game: &mut G, memory: &mut dyn MemoryStore) -> TickSummary
    where
        G: Game + ?Sized,
    {
        let now = game.time();

        let mut summary = TickSummary {
            tick: now,
            ..Default::default()
        };

        let features = Features::load(memory);

        logging::set_verbosity(if features.debug { LevelFilter::Debug } else { LevelFilter::Info });

        if features.reset_memory {
            info!("Resetting memory");

            memory.delete(UNITS_KEY);
            memory.delete(ROOMS_KEY);
            reset::clear(memory);

            self.costs = CostMatrixSystem::new();
            self.cache = TickCache::new();
        }

        self.refresh_config(memory);

        summary.collected = cleanup_memory(&*game, memory);

        for room_name in game.owned_rooms() {
            summary.rooms += 1;

            self.run_room(game, memory, room_name, &features, &mut summary);
        }

        self.costs.flush_storage(memory);
        self.costs.purge(now);
        self.cache.purge(now);

        debug!(
            "Tick {}: {} rooms, {} units, {} assigned, {} executed, {} removed, {} abandoned, {} spawned, {} sites, {} collected, {} errors",
            summary.tick,
            summary.rooms,
            summary.units,
            summary.assigned,
            summary.executed,
            summary.removed,
            summary.abandoned,
            summary.spawned.len(),
            summary.sites_placed,
            summary.collected,
            summary.errors
        );

        summary
    }

    fn run_room<G>(&mut self, game: &mut G, memory: &mut dyn MemoryStore, room_name: RoomName, features: &Features, summary: &mut TickSummary)
    where
        G: Game + ?Sized,
    {
        let now = game.time();

        let snapshot: Rc<RoomSnapshot> = self
            .cache
            .get(&format!("snapshot_{}", room_name), now, 1, || RoomSnapshot::capture(&*game, room_name));

        let mut units: Vec<UnitController> = snapshot
            .units
            .iter()
            .filter(|u| u.my && !u.spawning)
            .map(|u| UnitController::load(u.clone(), &*memory))
            .collect();

        let mut traffic = TrafficSnapshot::new();
        let mut ledger = AssignmentLedger::new();

        for unit in &units {
            traffic.update(unit.traffic());
            ledger.register(&unit.info, &unit.tasks, &snapshot);
        }

        if features.construction {
            match self.run_construction(game, memory, &snapshot) {
                Ok(placed) => summary.sites_placed += placed as u32,
                Err(err) => {
                    summary.errors += 1;

                    warn!("{}: construction failed: {}", room_name, err);
                }
            }
        }

        if features.spawning {
            match spawn::run_spawning(game, memory, &snapshot, &self.config.quotas()) {
                Ok(Some(name)) => summary.spawned.push(name),
                Ok(None) => {}
                Err(err) => {
                    summary.errors += 1;

                    warn!("{}: spawning failed: {}", room_name, err);
                }
            }
        }

        let base = self
            .costs
            .base_matrix(&*game, &*memory, room_name, &self.config.weights, self.config.pathing.matrix_ttl);

        let room = RoomContext {
            snapshot: &snapshot,
            base: &base,
            controller: snapshot.controller.as_ref().map(|c| c.pos),
        };

        for unit in units.iter_mut() {
            summary.units += 1;

            if let Err(err) = self.run_unit(game, unit, &room, &mut traffic, &mut ledger, features, summary) {
                summary.errors += 1;

                warn!("{}: turn failed: {}", unit.name(), err);
            }

            if let Err(err) = unit.save(memory) {
                summary.errors += 1;

                error!("{}: failed to persist state: {}", unit.name(), err);
            }
        }
    }

    fn run_construction<G>(&mut self, game: &mut G, memory: &mut dyn MemoryStore, snapshot: &RoomSnapshot) -> Result<usize, String>
    where
        G: Game + ?Sized,
    {
        let room_name = snapshot.room_name;
        let now = game.time();
        let level = snapshot.controller.as_ref().filter(|c| c.my).map(|c| c.level).unwrap_or(0);
        let settings = &self.config.construction;

        let mut queue = match BuildQueue::load(memory, room_name) {
            Some(queue) if !queue.is_stale(now, level, settings.plan_interval) => queue,
            _ => {
                let planner = BuildQueuePlanner {
                    layouts: &self.config.layouts,
                    weights: &self.config.weights,
                    roads: settings.roads,
                    max_ops: self.config.pathing.max_ops,
                };

                let requests = planner.plan(&*game, snapshot, self.pathfinder.as_mut())?;

                debug!("{}: planned {} construction requests at level {}", room_name, requests.len(), level);

                BuildQueue {
                    planned_at: now,
                    level,
                    requests,
                }
            }
        };

        let placed = execute_queue(game, snapshot, &mut queue, settings.max_sites);

        queue.save(memory, room_name)?;

        if placed > 0 {
            self.costs.invalidate(room_name);
        }

        Ok(placed)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_unit<G>(
        &mut self,
        game: &mut G,
        unit: &mut UnitController,
        room: &RoomContext,
        traffic: &mut TrafficSnapshot,
        ledger: &mut AssignmentLedger,
        features: &Features,
        summary: &mut TickSummary,
    ) -> Result<(), String>
    where
        G: Game + ?Sized,
    {
        if unit.is_idle() && self.assign(unit, room, ledger)? {
            summary.assigned += 1;
        }

        if unit.is_idle() {
            unit.travel = None;
            traffic.update(unit.traffic());

            return Ok(());
        }

        let outcome = {
            let visualizer = if features.visualize {
                self.visualizer.as_mut().map(|v| v.as_mut() as &mut dyn MovementVisualizer)
            } else {
                None
            };

            let mut traveler = Traveler {
                tick: game.time(),
                base: room.base,
                controller: room.controller,
                traffic,
                pathfinder: self.pathfinder.as_mut(),
                config: &self.config.pathing,
                overlay: &self.config.overlay,
                visualizer,
            };

            TaskExecutionEngine::execute(game, unit, &mut traveler)
        };

        summary.executed += outcome.executed;
        summary.removed += outcome.removed;

        if outcome.abandoned {
            summary.abandoned += 1;
        }

        ledger.register(&unit.info, &unit.tasks, room.snapshot);
        traffic.update(unit.traffic());

        Ok(())
    }

    /// Picks a task for an idle unit. Returns whether one was assigned.
    fn assign(&mut self, unit: &mut UnitController, room: &RoomContext, ledger: &mut AssignmentLedger) -> Result<bool, String> {
        let role = unit.role.clone().ok_or_else(|| format!("Expected a role for {}", unit.name()))?;

        let Some(role_config) = self.config.roles.iter().find(|r| r.name == role) else {
            warn!("{}: no configuration for role {}", unit.name(), role);

            return Ok(false);
        };

        let engine = TaskAssignmentEngine::new(&role_config.rules);

        let task = {
            let paths = PathLengthSource {
                pathfinder: self.pathfinder.as_mut(),
                matrix: room.base,
                max_ops: self.config.pathing.max_ops,
            };

            let mut context = AssignmentContext::new(&unit.info, room.snapshot, ledger).with_paths(paths);

            engine.assign(&mut context)
        };

        match task {
            Some(task) => {
                unit.tasks.push(task);
                ledger.register(&unit.info, &unit.tasks, room.snapshot);

                Ok(true)
            }
            None => {
                trace!("{}: no rule matched, staying idle", unit.name());

                Ok(false)
            }
        }
    }
}

/// Drops memory of units that no longer exist. Returns how many were removed.
pub fn cleanup_memory<W>(world: &W, memory: &mut dyn MemoryStore) -> u32
where
    W: WorldView + ?Sized,
{
    let alive: HashSet<String> = world.unit_names().into_iter().collect();
    let mut removed = 0;

    for name in memory.child_keys(UNITS_KEY) {
        if !alive.contains(&name) {
            debug!("Cleaning up memory of {}", name);

            memory.delete(&unit_root(&name));
            removed += 1;
        }
    }

    removed
}
