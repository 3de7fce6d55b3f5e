//! In-memory single room world. Implements the same query and intent
//! surface as the live game so the agent can be driven tick by tick without
//! a server.

use crate::constants::*;
use crate::location::*;
use crate::pathing::MovementVisualizer;
use crate::tasks::data::ActionVerb;
use crate::world::*;
use screeps::{Direction, Part, Position, RoomName, StructureType, Terrain};
use std::collections::HashMap;

const SPAWN_TIME_PER_PART: u32 = 3;
const ATTACK_POWER: u32 = 30;
const HITS_PER_PART: u32 = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct ActionRecord {
    pub tick: u32,
    pub unit: String,
    pub verb: ActionVerb,
    pub target: ObjectHandle,
    pub code: ActionCode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MoveRecord {
    pub tick: u32,
    pub unit: String,
    pub direction: Direction,
}

struct PendingSpawn {
    spawn: ObjectHandle,
    unit: String,
    remaining: u32,
}

pub struct SandboxWorld {
    time: u32,
    room_name: RoomName,
    terrain: Vec<Terrain>,
    units: Vec<UnitInfo>,
    unit_hits: HashMap<String, u32>,
    structures: Vec<StructureInfo>,
    sources: Vec<SourceInfo>,
    construction_sites: Vec<ConstructionSiteInfo>,
    dropped_resources: Vec<DroppedResourceInfo>,
    controller: Option<ControllerInfo>,
    pending_moves: Vec<(String, Direction)>,
    pending_spawns: Vec<PendingSpawn>,
    next_id: u32,
    pub controller_progress: u32,
    pub actions: Vec<ActionRecord>,
    pub moves: Vec<MoveRecord>,
}

impl SandboxWorld {
    /// An all plain room.
    pub fn new(room_name: RoomName) -> SandboxWorld {
        SandboxWorld {
            time: 1,
            room_name,
            terrain: vec![Terrain::Plain; ROOM_AREA],
            units: Vec::new(),
            unit_hits: HashMap::new(),
            structures: Vec::new(),
            sources: Vec::new(),
            construction_sites: Vec::new(),
            dropped_resources: Vec::new(),
            controller: None,
            pending_moves: Vec::new(),
            pending_spawns: Vec::new(),
            next_id: 0,
            controller_progress: 0,
            actions: Vec::new(),
            moves: Vec::new(),
        }
    }

    pub fn room_name(&self) -> RoomName {
        self.room_name
    }

    pub fn pos(&self, x: u8, y: u8) -> Position {
        Position::new(
            screeps::RoomCoordinate::new(x.min(ROOM_SIZE - 1)).unwrap_or(screeps::RoomCoordinate::MIN),
            screeps::RoomCoordinate::new(y.min(ROOM_SIZE - 1)).unwrap_or(screeps::RoomCoordinate::MIN),
            self.room_name,
        )
    }

    fn allocate_id(&mut self, prefix: &str) -> ObjectHandle {
        self.next_id += 1;

        ObjectHandle::new(format!("{}{}", prefix, self.next_id))
    }

    pub fn set_terrain(&mut self, x: u8, y: u8, terrain: Terrain) {
        if x < ROOM_SIZE && y < ROOM_SIZE {
            self.terrain[y as usize * ROOM_SIZE as usize + x as usize] = terrain;
        }
    }

    fn terrain_at(&self, pos: Position) -> Terrain {
        let (x, y) = coords(pos);

        self.terrain[y as usize * ROOM_SIZE as usize + x as usize]
    }

    pub fn add_unit(&mut self, name: &str, x: u8, y: u8, body: &[Part], energy: u32) -> ObjectHandle {
        let id = self.allocate_id("unit");
        let capacity = body.iter().filter(|p| **p == Part::Carry).count() as u32 * CARRY_CAPACITY;

        self.unit_hits.insert(name.to_string(), body.len() as u32 * HITS_PER_PART);
        self.units.push(UnitInfo {
            name: name.to_string(),
            id: id.clone(),
            pos: self.pos(x, y),
            fatigue: 0,
            body: body.to_vec(),
            store: Store::new(energy.min(capacity), capacity),
            my: true,
            spawning: false,
        });

        id
    }

    pub fn add_hostile(&mut self, name: &str, x: u8, y: u8, body: &[Part]) -> ObjectHandle {
        let id = self.add_unit(name, x, y, body, 0);

        if let Some(unit) = self.unit_mut(name) {
            unit.my = false;
        }

        id
    }

    pub fn unit_mut(&mut self, name: &str) -> Option<&mut UnitInfo> {
        self.units.iter_mut().find(|u| u.name == name)
    }

    pub fn add_structure(&mut self, structure_type: StructureType, x: u8, y: u8, store: Option<Store>) -> ObjectHandle {
        let id = self.allocate_id("structure");
        let pos = self.pos(x, y);

        self.structures.push(StructureInfo {
            id: id.clone(),
            structure_type,
            pos,
            store,
            hits: 1000,
            hits_max: 1000,
            my: true,
            spawning: false,
        });

        id
    }

    pub fn structure_mut(&mut self, id: &ObjectHandle) -> Option<&mut StructureInfo> {
        self.structures.iter_mut().find(|s| &s.id == id)
    }

    pub fn add_source(&mut self, x: u8, y: u8, energy: u32) -> ObjectHandle {
        let id = self.allocate_id("source");
        let pos = self.pos(x, y);

        self.sources.push(SourceInfo {
            id: id.clone(),
            pos,
            energy,
            energy_capacity: energy,
        });

        id
    }

    pub fn add_construction_site(&mut self, structure_type: StructureType, x: u8, y: u8, progress_total: u32) -> ObjectHandle {
        let id = self.allocate_id("site");
        let pos = self.pos(x, y);

        self.construction_sites.push(ConstructionSiteInfo {
            id: id.clone(),
            pos,
            structure_type,
            progress: 0,
            progress_total,
            my: true,
        });

        id
    }

    pub fn set_controller(&mut self, x: u8, y: u8, level: u8) -> ObjectHandle {
        let id = self.allocate_id("controller");
        let pos = self.pos(x, y);

        self.controller = Some(ControllerInfo {
            id: id.clone(),
            pos,
            level,
            my: true,
        });

        id
    }

    pub fn add_dropped(&mut self, x: u8, y: u8, amount: u32) -> ObjectHandle {
        let id = self.allocate_id("resource");
        let pos = self.pos(x, y);

        self.dropped_resources.push(DroppedResourceInfo { id: id.clone(), pos, amount });

        id
    }

    /// Removes any object with the given id.
    pub fn remove_object(&mut self, id: &ObjectHandle) {
        self.units.retain(|u| &u.id != id);
        self.structures.retain(|s| &s.id != id);
        self.sources.retain(|s| &s.id != id);
        self.construction_sites.retain(|s| &s.id != id);
        self.dropped_resources.retain(|r| &r.id != id);

        if self.controller.as_ref().map(|c| &c.id == id).unwrap_or(false) {
            self.controller = None;
        }
    }

    fn blocks_movement(&self, pos: Position) -> bool {
        self.terrain_at(pos) == Terrain::Wall
            || self.structures.iter().any(|s| s.pos == pos && !s.is_walkable())
            || self.sources.iter().any(|s| s.pos == pos)
            || self.controller.as_ref().map(|c| c.pos == pos).unwrap_or(false)
            || self.units.iter().any(|u| u.pos == pos)
    }

    /// Resolves this tick's intents and starts the next tick.
    pub fn advance(&mut self) {
        for (name, direction) in std::mem::take(&mut self.pending_moves) {
            let Some(index) = self.units.iter().position(|u| u.name == name) else {
                continue;
            };

            let Some(next) = step(self.units[index].pos, direction) else {
                continue;
            };

            if self.blocks_movement(next) {
                continue;
            }

            self.units[index].pos = next;
        }

        for unit in self.units.iter_mut() {
            let move_parts = unit.count_parts(Part::Move);

            unit.fatigue = unit.fatigue.saturating_sub(move_parts * 2);
        }

        let mut finished = Vec::new();

        for pending in self.pending_spawns.iter_mut() {
            pending.remaining = pending.remaining.saturating_sub(1);

            if pending.remaining == 0 {
                finished.push((pending.spawn.clone(), pending.unit.clone()));
            }
        }

        self.pending_spawns.retain(|p| p.remaining > 0);

        for (spawn_id, unit_name) in finished {
            let Some(spawn_pos) = self.structures.iter().find(|s| s.id == spawn_id).map(|s| s.pos) else {
                continue;
            };

            let exit = neighbours(spawn_pos).find(|p| !self.blocks_movement(*p));

            if let Some(structure) = self.structure_mut(&spawn_id) {
                structure.spawning = false;
            }

            if let Some(unit) = self.unit_mut(&unit_name) {
                unit.spawning = false;

                if let Some(exit) = exit {
                    unit.pos = exit;
                }
            }
        }

        self.time += 1;
    }

    fn record(&mut self, unit: &str, verb: ActionVerb, target: &ObjectHandle, code: ActionCode) -> ActionCode {
        self.actions.push(ActionRecord {
            tick: self.time,
            unit: unit.to_string(),
            verb,
            target: target.clone(),
            code,
        });

        code
    }

    fn apply(&mut self, unit_index: usize, verb: ActionVerb, target: &ObjectHandle) -> ActionCode {
        let unit = self.units[unit_index].clone();
        let work = unit.count_parts(Part::Work);

        match verb {
            ActionVerb::Move => ActionCode::InvalidTarget,
            ActionVerb::Harvest => {
                if work == 0 {
                    return ActionCode::NoBodyPart;
                }

                let Some(source) = self.sources.iter_mut().find(|s| &s.id == target) else {
                    return ActionCode::InvalidTarget;
                };

                if source.energy == 0 {
                    return ActionCode::NotEnoughResources;
                }

                let mut amount = (work * HARVEST_POWER).min(source.energy);

                if unit.store.capacity > 0 {
                    amount = amount.min(unit.store.free());

                    if amount == 0 {
                        return ActionCode::Full;
                    }

                    source.energy -= amount;
                    self.units[unit_index].store.used += amount;
                } else {
                    source.energy -= amount;

                    let id = self.allocate_id("resource");

                    self.dropped_resources.push(DroppedResourceInfo { id, pos: unit.pos, amount });
                }

                ActionCode::Ok
            }
            ActionVerb::Transfer => {
                if unit.store.is_empty() {
                    return ActionCode::NotEnoughResources;
                }

                let store = if let Some(structure) = self.structures.iter_mut().find(|s| &s.id == target) {
                    structure.store.as_mut()
                } else {
                    self.units.iter_mut().find(|u| &u.id == target).map(|u| &mut u.store)
                };

                let Some(store) = store else {
                    return ActionCode::InvalidTarget;
                };

                let amount = unit.store.used.min(store.free());

                if amount == 0 {
                    return ActionCode::Full;
                }

                store.used += amount;
                self.units[unit_index].store.used -= amount;

                ActionCode::Ok
            }
            ActionVerb::Withdraw => {
                let Some(store) = self.structures.iter_mut().find(|s| &s.id == target).and_then(|s| s.store.as_mut()) else {
                    return ActionCode::InvalidTarget;
                };

                if store.used == 0 {
                    return ActionCode::NotEnoughResources;
                }

                let amount = store.used.min(unit.store.free());

                if amount == 0 {
                    return ActionCode::Full;
                }

                store.used -= amount;
                self.units[unit_index].store.used += amount;

                ActionCode::Ok
            }
            ActionVerb::Pickup => {
                let Some(resource) = self.dropped_resources.iter_mut().find(|r| &r.id == target) else {
                    return ActionCode::InvalidTarget;
                };

                let amount = resource.amount.min(unit.store.free());

                if amount == 0 {
                    return ActionCode::Full;
                }

                resource.amount -= amount;
                self.units[unit_index].store.used += amount;
                self.dropped_resources.retain(|r| r.amount > 0);

                ActionCode::Ok
            }
            ActionVerb::Build => {
                if work == 0 {
                    return ActionCode::NoBodyPart;
                }

                if unit.store.is_empty() {
                    return ActionCode::NotEnoughResources;
                }

                let Some(index) = self.construction_sites.iter().position(|s| &s.id == target) else {
                    return ActionCode::InvalidTarget;
                };

                let site = &mut self.construction_sites[index];
                let amount = (work * BUILD_POWER).min(unit.store.used).min(site.progress_total - site.progress);

                site.progress += amount;
                self.units[unit_index].store.used -= amount;

                if site.progress >= site.progress_total {
                    let site = self.construction_sites.remove(index);
                    let store = default_store(site.structure_type);

                    self.structures.push(StructureInfo {
                        id: site.id,
                        structure_type: site.structure_type,
                        pos: site.pos,
                        store,
                        hits: 1000,
                        hits_max: 1000,
                        my: true,
                        spawning: false,
                    });
                }

                ActionCode::Ok
            }
            ActionVerb::Repair => {
                if work == 0 {
                    return ActionCode::NoBodyPart;
                }

                if unit.store.is_empty() {
                    return ActionCode::NotEnoughResources;
                }

                let Some(structure) = self.structures.iter_mut().find(|s| &s.id == target) else {
                    return ActionCode::InvalidTarget;
                };

                let energy = work.min(unit.store.used);

                structure.hits = (structure.hits + energy * REPAIR_POWER).min(structure.hits_max);
                self.units[unit_index].store.used -= energy;

                ActionCode::Ok
            }
            ActionVerb::Upgrade => {
                if work == 0 {
                    return ActionCode::NoBodyPart;
                }

                match &self.controller {
                    Some(controller) if &controller.id == target => {
                        if !controller.my {
                            return ActionCode::NotOwner;
                        }
                    }
                    _ => return ActionCode::InvalidTarget,
                }

                if unit.store.is_empty() {
                    return ActionCode::NotEnoughResources;
                }

                let energy = (work * UPGRADE_CONTROLLER_POWER).min(unit.store.used);

                self.controller_progress += energy;
                self.units[unit_index].store.used -= energy;

                ActionCode::Ok
            }
            ActionVerb::Attack => {
                let attack = unit.count_parts(Part::Attack);

                if attack == 0 {
                    return ActionCode::NoBodyPart;
                }

                let damage = attack * ATTACK_POWER;

                if let Some(victim) = self.units.iter().find(|u| &u.id == target).map(|u| u.name.clone()) {
                    let hits = self.unit_hits.entry(victim.clone()).or_insert(0);

                    *hits = hits.saturating_sub(damage);

                    if *hits == 0 {
                        self.units.retain(|u| u.name != victim);
                    }

                    return ActionCode::Ok;
                }

                let Some(structure) = self.structures.iter_mut().find(|s| &s.id == target) else {
                    return ActionCode::InvalidTarget;
                };

                structure.hits = structure.hits.saturating_sub(damage);

                if structure.hits == 0 {
                    let id = structure.id.clone();

                    self.structures.retain(|s| s.id != id);
                }

                ActionCode::Ok
            }
        }
    }
}

fn default_store(structure_type: StructureType) -> Option<Store> {
    match structure_type {
        StructureType::Spawn => Some(Store::new(0, 300)),
        StructureType::Extension => Some(Store::new(0, 50)),
        StructureType::Tower => Some(Store::new(0, 1000)),
        StructureType::Container => Some(Store::new(0, 2000)),
        StructureType::Storage => Some(Store::new(0, 1_000_000)),
        _ => None,
    }
}

impl WorldView for SandboxWorld {
    fn time(&self) -> u32 {
        self.time
    }

    fn owned_rooms(&self) -> Vec<RoomName> {
        match &self.controller {
            Some(controller) if controller.my => vec![self.room_name],
            _ => Vec::new(),
        }
    }

    fn terrain(&self, room_name: RoomName, x: u8, y: u8) -> Terrain {
        if room_name != self.room_name || x >= ROOM_SIZE || y >= ROOM_SIZE {
            return Terrain::Wall;
        }

        self.terrain[y as usize * ROOM_SIZE as usize + x as usize]
    }

    fn units(&self, room_name: RoomName) -> Vec<UnitInfo> {
        self.units.iter().filter(|u| u.pos.room_name() == room_name).cloned().collect()
    }

    fn structures(&self, room_name: RoomName) -> Vec<StructureInfo> {
        self.structures.iter().filter(|s| s.pos.room_name() == room_name).cloned().collect()
    }

    fn sources(&self, room_name: RoomName) -> Vec<SourceInfo> {
        self.sources.iter().filter(|s| s.pos.room_name() == room_name).cloned().collect()
    }

    fn construction_sites(&self, room_name: RoomName) -> Vec<ConstructionSiteInfo> {
        self.construction_sites.iter().filter(|s| s.pos.room_name() == room_name).cloned().collect()
    }

    fn dropped_resources(&self, room_name: RoomName) -> Vec<DroppedResourceInfo> {
        self.dropped_resources.iter().filter(|r| r.pos.room_name() == room_name).cloned().collect()
    }

    fn controller(&self, room_name: RoomName) -> Option<ControllerInfo> {
        self.controller.clone().filter(|c| c.pos.room_name() == room_name)
    }

    fn room_energy(&self, room_name: RoomName) -> (u32, u32) {
        self.structures
            .iter()
            .filter(|s| s.my && s.pos.room_name() == room_name)
            .filter(|s| matches!(s.structure_type, StructureType::Spawn | StructureType::Extension))
            .filter_map(|s| s.store)
            .fold((0, 0), |(used, capacity), store| (used + store.used, capacity + store.capacity))
    }

    fn get_object(&self, id: &ObjectHandle) -> Option<RoomObject> {
        self.units
            .iter()
            .find(|u| &u.id == id)
            .map(|u| RoomObject::Unit(u.clone()))
            .or_else(|| self.structures.iter().find(|s| &s.id == id).map(|s| RoomObject::Structure(s.clone())))
            .or_else(|| self.sources.iter().find(|s| &s.id == id).map(|s| RoomObject::Source(s.clone())))
            .or_else(|| {
                self.construction_sites
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| RoomObject::ConstructionSite(s.clone()))
            })
            .or_else(|| {
                self.dropped_resources
                    .iter()
                    .find(|r| &r.id == id)
                    .map(|r| RoomObject::DroppedResource(r.clone()))
            })
            .or_else(|| self.controller.iter().find(|c| &c.id == id).map(|c| RoomObject::Controller(c.clone())))
    }

    fn unit(&self, name: &str) -> Option<UnitInfo> {
        self.units.iter().find(|u| u.name == name).cloned()
    }

    fn unit_names(&self) -> Vec<String> {
        self.units.iter().filter(|u| u.my).map(|u| u.name.clone()).collect()
    }
}

impl UnitActions for SandboxWorld {
    fn move_direction(&mut self, unit: &str, direction: Direction) -> ActionCode {
        let Some(info) = self.units.iter().find(|u| u.name == unit) else {
            return ActionCode::InvalidTarget;
        };

        if !info.my {
            return ActionCode::NotOwner;
        }

        if info.spawning {
            return ActionCode::Busy;
        }

        if !info.has_part(Part::Move) {
            return ActionCode::NoBodyPart;
        }

        if info.fatigue > 0 {
            return ActionCode::Tired;
        }

        self.pending_moves.retain(|(name, _)| name != unit);
        self.pending_moves.push((unit.to_string(), direction));
        self.moves.push(MoveRecord {
            tick: self.time,
            unit: unit.to_string(),
            direction,
        });

        ActionCode::Ok
    }

    fn act(&mut self, unit: &str, verb: ActionVerb, target: &ObjectHandle) -> ActionCode {
        let Some(index) = self.units.iter().position(|u| u.name == unit) else {
            return ActionCode::InvalidTarget;
        };

        let code = if !self.units[index].my {
            ActionCode::NotOwner
        } else if self.units[index].spawning {
            ActionCode::Busy
        } else {
            match self.get_object(target) {
                None => ActionCode::InvalidTarget,
                Some(object) if !in_range(self.units[index].pos, object.pos(), verb.range()) => ActionCode::NotInRange,
                Some(_) => self.apply(index, verb, target),
            }
        };

        self.record(unit, verb, target, code)
    }

    fn spawn_unit(&mut self, spawn: &ObjectHandle, body: &[Part], name: &str) -> ActionCode {
        let Some(structure) = self.structures.iter().find(|s| &s.id == spawn) else {
            return ActionCode::InvalidTarget;
        };

        if structure.structure_type != StructureType::Spawn || !structure.my {
            return ActionCode::InvalidTarget;
        }

        if structure.spawning {
            return ActionCode::Busy;
        }

        if self.units.iter().any(|u| u.name == name) {
            return ActionCode::NameExists;
        }

        if body.is_empty() || body.len() > MAX_CREEP_SIZE {
            return ActionCode::Failed;
        }

        let room_name = structure.pos.room_name();
        let spawn_pos = structure.pos;
        let mut cost: u32 = body.iter().map(|p| part_cost(*p)).sum();

        if self.room_energy(room_name).0 < cost {
            return ActionCode::NotEnoughResources;
        }

        for structure in self.structures.iter_mut().filter(|s| s.my && s.pos.room_name() == room_name) {
            if !matches!(structure.structure_type, StructureType::Spawn | StructureType::Extension) {
                continue;
            }

            if let Some(store) = structure.store.as_mut() {
                let taken = store.used.min(cost);

                store.used -= taken;
                cost -= taken;
            }
        }

        if let Some(structure) = self.structure_mut(spawn) {
            structure.spawning = true;
        }

        let id = self.allocate_id("unit");
        let capacity = body.iter().filter(|p| **p == Part::Carry).count() as u32 * CARRY_CAPACITY;

        self.unit_hits.insert(name.to_string(), body.len() as u32 * HITS_PER_PART);
        self.units.push(UnitInfo {
            name: name.to_string(),
            id,
            pos: spawn_pos,
            fatigue: 0,
            body: body.to_vec(),
            store: Store::new(0, capacity),
            my: true,
            spawning: true,
        });
        self.pending_spawns.push(PendingSpawn {
            spawn: spawn.clone(),
            unit: name.to_string(),
            remaining: body.len() as u32 * SPAWN_TIME_PER_PART,
        });

        ActionCode::Ok
    }

    fn create_construction_site(&mut self, pos: Position, structure_type: StructureType) -> ActionCode {
        if pos.room_name() != self.room_name {
            return ActionCode::InvalidTarget;
        }

        let (x, y) = coords(pos);

        if is_room_edge(x, y) || self.terrain_at(pos) == Terrain::Wall {
            return ActionCode::InvalidTarget;
        }

        if self.structures.iter().any(|s| s.pos == pos) || self.construction_sites.iter().any(|s| s.pos == pos) {
            return ActionCode::InvalidTarget;
        }

        let id = self.allocate_id("site");

        self.construction_sites.push(ConstructionSiteInfo {
            id,
            pos,
            structure_type,
            progress: 0,
            progress_total: construction_cost(structure_type),
            my: true,
        });

        ActionCode::Ok
    }
}

fn construction_cost(structure_type: StructureType) -> u32 {
    match structure_type {
        StructureType::Road => 300,
        StructureType::Container => 5000,
        StructureType::Extension => 3000,
        StructureType::Tower => 5000,
        StructureType::Spawn => 15000,
        StructureType::Storage => 30000,
        StructureType::Link => 5000,
        _ => 1000,
    }
}

/// Keeps every path, stuck and failure report it is given.
#[derive(Default)]
pub struct RecordingVisualizer {
    pub paths: Vec<(Position, Vec<Position>)>,
    pub stuck: Vec<(Position, u32)>,
    pub failed: Vec<Position>,
}

impl MovementVisualizer for RecordingVisualizer {
    fn visualize_path(&mut self, unit_pos: Position, path: &[Position]) {
        self.paths.push((unit_pos, path.to_vec()));
    }

    fn visualize_stuck(&mut self, unit_pos: Position, ticks: u32) {
        self.stuck.push((unit_pos, ticks));
    }

    fn visualize_failed(&mut self, unit_pos: Position) {
        self.failed.push(unit_pos);
    }
}
