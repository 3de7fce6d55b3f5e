use super::layout::*;
use super::snapshot::*;
use crate::constants::*;
use crate::location::*;
use crate::memory::*;
use crate::pathing::*;
use crate::world::*;
use itertools::*;
use log::*;
use screeps::{Position, RoomName, StructureType, Terrain};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const BUILD_QUEUE_KEY: &str = "buildQueue";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Ticks between re-plans of a room's build queue.
    pub plan_interval: u32,
    /// Construction sites a room may have open at once.
    pub max_sites: usize,
    pub roads: bool,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        ConstructionConfig {
            plan_interval: 100,
            max_sites: MAX_CONSTRUCTION_SITES_PER_ROOM,
            roads: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub pos: Position,
    pub structure_type: StructureType,
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildQueue {
    pub planned_at: u32,
    pub level: u8,
    pub requests: Vec<BuildRequest>,
}

impl BuildQueue {
    pub fn load(memory: &dyn MemoryStore, room_name: RoomName) -> Option<BuildQueue> {
        match get_typed::<BuildQueue>(memory, &room_path(room_name, BUILD_QUEUE_KEY)) {
            Ok(queue) => queue,
            Err(err) => {
                warn!("Discarding unreadable build queue for {}: {}", room_name, err);

                None
            }
        }
    }

    pub fn save(&self, memory: &mut dyn MemoryStore, room_name: RoomName) -> Result<(), String> {
        set_typed(memory, &room_path(room_name, BUILD_QUEUE_KEY), self)
    }

    pub fn is_stale(&self, now: u32, level: u8, plan_interval: u32) -> bool {
        self.level != level || now.saturating_sub(self.planned_at) >= plan_interval
    }
}

pub fn structure_priority(structure_type: StructureType) -> u32 {
    match structure_type {
        StructureType::Spawn => 0,
        StructureType::Extension => 1,
        StructureType::Tower => 2,
        StructureType::Container => 3,
        StructureType::Storage => 4,
        StructureType::Link => 5,
        StructureType::Road => 6,
        _ => 10,
    }
}

pub struct BuildQueuePlanner<'a> {
    pub layouts: &'a [LayoutTemplate],
    pub weights: &'a CostWeights,
    pub roads: bool,
    pub max_ops: u32,
}

struct PlanState {
    anchor: Position,
    level: u8,
    occupied: HashSet<Position>,
    counts: HashMap<StructureType, u32>,
    requests: Vec<BuildRequest>,
}

impl PlanState {
    fn try_add(&mut self, snapshot: &RoomSnapshot, pos: Position, structure_type: StructureType) -> bool {
        let (x, y) = coords(pos);

        if is_room_edge(x, y) || snapshot.terrain(pos) == Terrain::Wall || self.occupied.contains(&pos) {
            return false;
        }

        let count = self.counts.entry(structure_type).or_insert(0);

        if *count >= controller_structure_limit(structure_type, self.level) {
            return false;
        }

        *count += 1;

        self.occupied.insert(pos);
        self.requests.push(BuildRequest {
            pos,
            structure_type,
            priority: structure_priority(structure_type),
        });

        true
    }
}

impl<'a> BuildQueuePlanner<'a> {
    /// Lays the unlocked templates around the room's first spawn and routes
    /// roads from it to every source and the controller. Requests come back
    /// ordered by structure priority, then distance to the spawn.
    pub fn plan<W>(&self, world: &W, snapshot: &RoomSnapshot, pathfinder: &mut dyn PathfindingProvider) -> Result<Vec<BuildRequest>, String>
    where
        W: WorldView + ?Sized,
    {
        let Some(anchor) = snapshot.my_structures_of(StructureType::Spawn).map(|s| s.pos).next() else {
            return Ok(Vec::new());
        };

        let level = snapshot.controller.as_ref().filter(|c| c.my).map(|c| c.level).unwrap_or(0);

        let mut state = PlanState {
            anchor,
            level,
            occupied: HashSet::new(),
            counts: HashMap::new(),
            requests: Vec::new(),
        };

        for structure in &snapshot.structures {
            state.occupied.insert(structure.pos);
            *state.counts.entry(structure.structure_type).or_insert(0) += 1;
        }

        for site in snapshot.construction_sites.iter().filter(|s| s.my) {
            state.occupied.insert(site.pos);
            *state.counts.entry(site.structure_type).or_insert(0) += 1;
        }

        state.occupied.extend(snapshot.sources.iter().map(|s| s.pos));
        state.occupied.extend(snapshot.controller.iter().map(|c| c.pos));

        let mut placements = Vec::new();

        for layout in self.layouts.iter().filter(|l| l.min_level <= level) {
            placements.extend(layout.placements()?);
        }

        let placements = placements
            .into_iter()
            .sorted_by_key(|p| (structure_priority(p.structure_type), p.dx.unsigned_abs().max(p.dy.unsigned_abs())));

        for placement in placements {
            if let Some(pos) = offset(anchor, placement.dx, placement.dy) {
                state.try_add(snapshot, pos, placement.structure_type);
            }
        }

        if self.roads {
            self.plan_roads(world, snapshot, pathfinder, &mut state);
        }

        let mut requests = state.requests;

        requests.sort_by_key(|r| (r.priority, range_between(anchor, r.pos)));

        Ok(requests)
    }

    fn plan_roads<W>(&self, world: &W, snapshot: &RoomSnapshot, pathfinder: &mut dyn PathfindingProvider, state: &mut PlanState)
    where
        W: WorldView + ?Sized,
    {
        let mut matrix = CostMatrixBuilder::build(world, snapshot.room_name, self.weights);

        for request in &state.requests {
            if request.structure_type == StructureType::Road {
                matrix.set_pos(request.pos, self.weights.road.max(1));
            } else {
                matrix.set_pos(request.pos, COST_MATRIX_BLOCKED);
            }
        }

        let controller = snapshot.controller.as_ref().filter(|c| c.my).map(|c| (c.pos, UPGRADE_RANGE, false));

        let goals = snapshot
            .sources
            .iter()
            .map(|s| (s.pos, ADJACENT_RANGE, true))
            .chain(controller)
            .sorted_by_key(|(pos, _, _)| range_between(state.anchor, *pos))
            .collect_vec();

        for (goal, range, container_at_end) in goals {
            let road_matrix = matrix.clone();
            let room_name = snapshot.room_name;

            let mut callback = move |requested: RoomName| if requested == room_name { Some(road_matrix.clone()) } else { None };

            let result = pathfinder.search(state.anchor, goal, range, &mut callback, self.max_ops, 1);

            if result.incomplete {
                debug!("{}: no road route from {} to {}", snapshot.room_name, state.anchor, goal);
                continue;
            }

            let last = result.path.len().saturating_sub(1);

            for (index, pos) in result.path.into_iter().enumerate() {
                if index == last && container_at_end && state.try_add(snapshot, pos, StructureType::Container) {
                    matrix.set_pos(pos, COST_MATRIX_BLOCKED);
                    continue;
                }

                if state.try_add(snapshot, pos, StructureType::Road) {
                    matrix.set_pos(pos, self.weights.road.max(1));
                }
            }
        }
    }
}

/// Places construction sites for queued requests until the room has
/// `max_sites` open. Requests the world rejects outright are dropped; the
/// rest stay queued. Returns how many sites were placed.
pub fn execute_queue<G>(game: &mut G, snapshot: &RoomSnapshot, queue: &mut BuildQueue, max_sites: usize) -> usize
where
    G: Game + ?Sized,
{
    let open = snapshot.construction_sites.iter().filter(|s| s.my).count();
    let mut placed = 0;
    let mut remaining = Vec::new();

    for request in queue.requests.drain(..) {
        if open + placed >= max_sites {
            remaining.push(request);
            continue;
        }

        match game.create_construction_site(request.pos, request.structure_type) {
            ActionCode::Ok => placed += 1,
            code if code.is_transient() => remaining.push(request),
            code => debug!("Dropping {:?} at {}: {:?}", request.structure_type, request.pos, code),
        }
    }

    queue.requests = remaining;

    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_put_spawns_first_and_roads_last() {
        assert!(structure_priority(StructureType::Spawn) < structure_priority(StructureType::Extension));
        assert!(structure_priority(StructureType::Extension) < structure_priority(StructureType::Road));
    }

    #[test]
    fn queue_goes_stale_on_interval_or_level_change() {
        let queue = BuildQueue {
            planned_at: 100,
            level: 2,
            requests: Vec::new(),
        };

        assert!(!queue.is_stale(150, 2, 100));
        assert!(queue.is_stale(200, 2, 100));
        assert!(queue.is_stale(101, 3, 100));
    }
}
