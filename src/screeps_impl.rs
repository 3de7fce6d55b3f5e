//! Adapter from the live game API to the agent's world and memory traits.

use crate::memory::*;
use crate::tasks::data::ActionVerb;
use crate::world::{self, *};
use screeps::{
    find, game, prelude::*, raw_memory, ConstructionSite, Creep, Direction, ObjectId, Part, Position, Resource, ResourceType, RoomName,
    Source, Structure, StructureController, StructureObject, StructureSpawn, StructureType, Terrain,
};
use screeps::action_error_codes::{
    BuildErrorCode, CreepAttackErrorCode, CreepMoveDirectionErrorCode, CreepRepairErrorCode, HarvestErrorCode, PickupErrorCode,
    RoomPositionCreateConstructionSiteErrorCode, SpawnCreepErrorCode, TransferErrorCode, UpgradeControllerErrorCode, WithdrawErrorCode,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::str::FromStr;
use wasm_bindgen::JsCast;

const TERRAIN_MASK_WALL: u8 = 1;
const TERRAIN_MASK_SWAMP: u8 = 2;

fn energy_store(store: &screeps::Store) -> world::Store {
    world::Store::new(
        store.get_used_capacity(Some(ResourceType::Energy)),
        store.get_capacity(Some(ResourceType::Energy)),
    )
}

fn unit_info(creep: &Creep) -> UnitInfo {
    let name = creep.name();

    UnitInfo {
        id: ObjectHandle::new(creep.try_id().map(|id| id.to_string()).unwrap_or_else(|| name.clone())),
        name,
        pos: creep.pos(),
        fatigue: creep.fatigue(),
        body: creep.body().iter().map(|p| p.part()).collect(),
        store: energy_store(&creep.store()),
        my: creep.my(),
        spawning: creep.spawning(),
    }
}

fn structure_info(structure: &StructureObject) -> StructureInfo {
    let base = structure.as_structure();

    let (hits, hits_max) = structure.as_attackable().map(|a| (a.hits(), a.hits_max())).unwrap_or((0, 0));

    let spawning = match structure {
        StructureObject::StructureSpawn(spawn) => spawn.spawning().is_some(),
        _ => false,
    };

    StructureInfo {
        id: ObjectHandle::new(base.id().to_string()),
        structure_type: base.structure_type(),
        pos: base.pos(),
        store: structure.as_has_store().map(|s| energy_store(&s.store())),
        hits,
        hits_max,
        my: structure.as_owned().map(|o| o.my()).unwrap_or(false),
        spawning,
    }
}

impl From<HarvestErrorCode> for ActionCode {
    fn from(code: HarvestErrorCode) -> ActionCode {
        match code {
            HarvestErrorCode::NotOwner => ActionCode::NotOwner,
            HarvestErrorCode::Busy => ActionCode::Busy,
            HarvestErrorCode::NotFound => ActionCode::InvalidTarget,
            HarvestErrorCode::NotEnoughResources => ActionCode::NotEnoughResources,
            HarvestErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            HarvestErrorCode::NotInRange => ActionCode::NotInRange,
            HarvestErrorCode::Tired => ActionCode::Tired,
            HarvestErrorCode::NoBodypart => ActionCode::NoBodyPart,
            HarvestErrorCode::RclNotEnough => ActionCode::Failed,
        }
    }
}

impl From<TransferErrorCode> for ActionCode {
    fn from(code: TransferErrorCode) -> ActionCode {
        match code {
            TransferErrorCode::NotOwner => ActionCode::NotOwner,
            TransferErrorCode::Busy => ActionCode::Busy,
            TransferErrorCode::NotEnoughResources => ActionCode::NotEnoughResources,
            TransferErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            TransferErrorCode::Full => ActionCode::Full,
            TransferErrorCode::NotInRange => ActionCode::NotInRange,
            TransferErrorCode::InvalidArgs => ActionCode::Failed,
        }
    }
}

impl From<WithdrawErrorCode> for ActionCode {
    fn from(code: WithdrawErrorCode) -> ActionCode {
        match code {
            WithdrawErrorCode::NotOwner => ActionCode::NotOwner,
            WithdrawErrorCode::Busy => ActionCode::Busy,
            WithdrawErrorCode::NotEnoughResources => ActionCode::NotEnoughResources,
            WithdrawErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            WithdrawErrorCode::Full => ActionCode::Full,
            WithdrawErrorCode::NotInRange => ActionCode::NotInRange,
            WithdrawErrorCode::InvalidArgs => ActionCode::Failed,
        }
    }
}

impl From<PickupErrorCode> for ActionCode {
    fn from(code: PickupErrorCode) -> ActionCode {
        match code {
            PickupErrorCode::NotOwner => ActionCode::NotOwner,
            PickupErrorCode::Busy => ActionCode::Busy,
            PickupErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            PickupErrorCode::Full => ActionCode::Full,
            PickupErrorCode::NotInRange => ActionCode::NotInRange,
        }
    }
}

impl From<BuildErrorCode> for ActionCode {
    fn from(code: BuildErrorCode) -> ActionCode {
        match code {
            BuildErrorCode::NotOwner => ActionCode::NotOwner,
            BuildErrorCode::Busy => ActionCode::Busy,
            BuildErrorCode::NotEnoughResources => ActionCode::NotEnoughResources,
            BuildErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            BuildErrorCode::NotInRange => ActionCode::NotInRange,
            BuildErrorCode::NoBodypart => ActionCode::NoBodyPart,
        }
    }
}

impl From<CreepRepairErrorCode> for ActionCode {
    fn from(code: CreepRepairErrorCode) -> ActionCode {
        match code {
            CreepRepairErrorCode::NotOwner => ActionCode::NotOwner,
            CreepRepairErrorCode::Busy => ActionCode::Busy,
            CreepRepairErrorCode::NotEnoughResources => ActionCode::NotEnoughResources,
            CreepRepairErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            CreepRepairErrorCode::NotInRange => ActionCode::NotInRange,
            CreepRepairErrorCode::NoBodypart => ActionCode::NoBodyPart,
        }
    }
}

impl From<UpgradeControllerErrorCode> for ActionCode {
    fn from(code: UpgradeControllerErrorCode) -> ActionCode {
        match code {
            UpgradeControllerErrorCode::NotOwner => ActionCode::NotOwner,
            UpgradeControllerErrorCode::Busy => ActionCode::Busy,
            UpgradeControllerErrorCode::NotEnoughResources => ActionCode::NotEnoughResources,
            UpgradeControllerErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            UpgradeControllerErrorCode::NotInRange => ActionCode::NotInRange,
            UpgradeControllerErrorCode::NoBodypart => ActionCode::NoBodyPart,
            UpgradeControllerErrorCode::AccessDenied => ActionCode::NotOwner,
        }
    }
}

impl From<CreepAttackErrorCode> for ActionCode {
    fn from(code: CreepAttackErrorCode) -> ActionCode {
        match code {
            CreepAttackErrorCode::NotOwner => ActionCode::NotOwner,
            CreepAttackErrorCode::Busy => ActionCode::Busy,
            CreepAttackErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            CreepAttackErrorCode::NotInRange => ActionCode::NotInRange,
            CreepAttackErrorCode::NoBodypart => ActionCode::NoBodyPart,
        }
    }
}

impl From<CreepMoveDirectionErrorCode> for ActionCode {
    fn from(code: CreepMoveDirectionErrorCode) -> ActionCode {
        match code {
            CreepMoveDirectionErrorCode::NotOwner => ActionCode::NotOwner,
            CreepMoveDirectionErrorCode::Busy => ActionCode::Busy,
            CreepMoveDirectionErrorCode::InvalidArgs => ActionCode::Failed,
            CreepMoveDirectionErrorCode::Tired => ActionCode::Tired,
            CreepMoveDirectionErrorCode::NoBodypart => ActionCode::NoBodyPart,
        }
    }
}

impl From<SpawnCreepErrorCode> for ActionCode {
    fn from(code: SpawnCreepErrorCode) -> ActionCode {
        match code {
            SpawnCreepErrorCode::NotOwner => ActionCode::NotOwner,
            SpawnCreepErrorCode::NameExists => ActionCode::NameExists,
            SpawnCreepErrorCode::Busy => ActionCode::Busy,
            SpawnCreepErrorCode::NotEnoughEnergy => ActionCode::NotEnoughResources,
            SpawnCreepErrorCode::InvalidArgs => ActionCode::Failed,
            SpawnCreepErrorCode::RclNotEnough => ActionCode::Failed,
        }
    }
}

impl From<RoomPositionCreateConstructionSiteErrorCode> for ActionCode {
    fn from(code: RoomPositionCreateConstructionSiteErrorCode) -> ActionCode {
        match code {
            RoomPositionCreateConstructionSiteErrorCode::NotOwner => ActionCode::NotOwner,
            RoomPositionCreateConstructionSiteErrorCode::InvalidTarget => ActionCode::InvalidTarget,
            RoomPositionCreateConstructionSiteErrorCode::Full => ActionCode::Full,
            RoomPositionCreateConstructionSiteErrorCode::NotInRange => ActionCode::NotInRange,
            RoomPositionCreateConstructionSiteErrorCode::InvalidArgs => ActionCode::InvalidTarget,
            RoomPositionCreateConstructionSiteErrorCode::RclNotEnough => ActionCode::Failed,
        }
    }
}

fn action_code<E: Into<ActionCode>>(result: Result<(), E>) -> ActionCode {
    match result {
        Ok(()) => ActionCode::Ok,
        Err(code) => code.into(),
    }
}

fn resolve<T>(id: &ObjectHandle) -> Option<T>
where
    ObjectId<T>: FromStr,
    T: MaybeHasId + JsCast,
{
    ObjectId::<T>::from_str(id).ok()?.resolve()
}

fn resolve_structure(id: &ObjectHandle) -> Option<StructureObject> {
    resolve::<Structure>(id).map(StructureObject::from)
}

/// Live game view. Room queries are memoized for the current tick; terrain
/// is kept for the lifetime of the wasm instance.
#[derive(Default)]
pub struct LiveGame {
    terrain: RefCell<HashMap<RoomName, Vec<u8>>>,
    objects: RefCell<Option<HashMap<ObjectHandle, RoomObject>>>,
}

impl LiveGame {
    pub fn begin_tick(&mut self) {
        self.objects.replace(None);
    }

    fn creep(&self, name: &str) -> Option<Creep> {
        game::creeps().get(name.to_string())
    }

    fn index(&self) -> HashMap<ObjectHandle, RoomObject> {
        let mut index = HashMap::new();

        for room in game::rooms().values() {
            let room_name = room.name();

            for unit in self.units(room_name) {
                index.insert(unit.id.clone(), RoomObject::Unit(unit));
            }

            for structure in self.structures(room_name) {
                index.insert(structure.id.clone(), RoomObject::Structure(structure));
            }

            for source in self.sources(room_name) {
                index.insert(source.id.clone(), RoomObject::Source(source));
            }

            for site in self.construction_sites(room_name) {
                index.insert(site.id.clone(), RoomObject::ConstructionSite(site));
            }

            for resource in self.dropped_resources(room_name) {
                index.insert(resource.id.clone(), RoomObject::DroppedResource(resource));
            }

            if let Some(controller) = self.controller(room_name) {
                index.insert(controller.id.clone(), RoomObject::Controller(controller));
            }
        }

        index
    }
}

impl WorldView for LiveGame {
    fn time(&self) -> u32 {
        game::time()
    }

    fn owned_rooms(&self) -> Vec<RoomName> {
        game::rooms()
            .values()
            .filter(|room| room.controller().map(|c| c.my()).unwrap_or(false))
            .map(|room| room.name())
            .collect()
    }

    fn terrain(&self, room_name: RoomName, x: u8, y: u8) -> Terrain {
        let mut terrain = self.terrain.borrow_mut();

        if !terrain.contains_key(&room_name) {
            let Some(room_terrain) = game::map::get_room_terrain(room_name) else {
                return Terrain::Wall;
            };

            terrain.insert(room_name, room_terrain.get_raw_buffer().to_vec());
        }

        let bits = terrain
            .get(&room_name)
            .and_then(|buffer| buffer.get(y as usize * 50 + x as usize).copied())
            .unwrap_or(TERRAIN_MASK_WALL);

        if bits & TERRAIN_MASK_WALL != 0 {
            Terrain::Wall
        } else if bits & TERRAIN_MASK_SWAMP != 0 {
            Terrain::Swamp
        } else {
            Terrain::Plain
        }
    }

    fn units(&self, room_name: RoomName) -> Vec<UnitInfo> {
        game::rooms()
            .get(room_name)
            .map(|room| room.find(find::CREEPS, None).iter().map(unit_info).collect())
            .unwrap_or_default()
    }

    fn structures(&self, room_name: RoomName) -> Vec<StructureInfo> {
        game::rooms()
            .get(room_name)
            .map(|room| room.find(find::STRUCTURES, None).iter().map(structure_info).collect())
            .unwrap_or_default()
    }

    fn sources(&self, room_name: RoomName) -> Vec<SourceInfo> {
        game::rooms()
            .get(room_name)
            .map(|room| {
                room.find(find::SOURCES, None)
                    .iter()
                    .map(|s| SourceInfo {
                        id: ObjectHandle::new(s.id().to_string()),
                        pos: s.pos(),
                        energy: s.energy(),
                        energy_capacity: s.energy_capacity(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn construction_sites(&self, room_name: RoomName) -> Vec<ConstructionSiteInfo> {
        game::rooms()
            .get(room_name)
            .map(|room| {
                room.find(find::CONSTRUCTION_SITES, None)
                    .iter()
                    .filter_map(|s| {
                        Some(ConstructionSiteInfo {
                            id: ObjectHandle::new(s.try_id()?.to_string()),
                            pos: s.pos(),
                            structure_type: s.structure_type(),
                            progress: s.progress(),
                            progress_total: s.progress_total(),
                            my: s.my(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn dropped_resources(&self, room_name: RoomName) -> Vec<DroppedResourceInfo> {
        game::rooms()
            .get(room_name)
            .map(|room| {
                room.find(find::DROPPED_RESOURCES, None)
                    .iter()
                    .filter(|r| r.resource_type() == ResourceType::Energy)
                    .map(|r| DroppedResourceInfo {
                        id: ObjectHandle::new(r.id().to_string()),
                        pos: r.pos(),
                        amount: r.amount(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn controller(&self, room_name: RoomName) -> Option<ControllerInfo> {
        let controller = game::rooms().get(room_name)?.controller()?;

        Some(ControllerInfo {
            id: ObjectHandle::new(controller.id().to_string()),
            pos: controller.pos(),
            level: controller.level(),
            my: controller.my(),
        })
    }

    fn room_energy(&self, room_name: RoomName) -> (u32, u32) {
        game::rooms()
            .get(room_name)
            .map(|room| (room.energy_available(), room.energy_capacity_available()))
            .unwrap_or((0, 0))
    }

    fn get_object(&self, id: &ObjectHandle) -> Option<RoomObject> {
        if self.objects.borrow().is_none() {
            let index = self.index();

            self.objects.replace(Some(index));
        }

        self.objects.borrow().as_ref()?.get(id).cloned()
    }

    fn unit(&self, name: &str) -> Option<UnitInfo> {
        self.creep(name).map(|c| unit_info(&c))
    }

    fn unit_names(&self) -> Vec<String> {
        game::creeps().keys().collect()
    }
}

impl UnitActions for LiveGame {
    fn move_direction(&mut self, unit: &str, direction: Direction) -> ActionCode {
        match self.creep(unit) {
            Some(creep) => action_code(creep.move_direction(direction)),
            None => ActionCode::InvalidTarget,
        }
    }

    fn act(&mut self, unit: &str, verb: ActionVerb, target: &ObjectHandle) -> ActionCode {
        let Some(creep) = self.creep(unit) else {
            return ActionCode::InvalidTarget;
        };

        // Stores and hit points change once an intent resolves.
        self.objects.replace(None);

        let code = match verb {
            ActionVerb::Move => return ActionCode::InvalidTarget,
            ActionVerb::Harvest => resolve::<Source>(target).map(|s| action_code(creep.harvest(&s))),
            ActionVerb::Transfer => match resolve_structure(target) {
                Some(structure) => structure
                    .as_transferable()
                    .map(|t| action_code(creep.transfer(t, ResourceType::Energy, None))),
                None => resolve::<Creep>(target).map(|other| action_code(creep.transfer(&other, ResourceType::Energy, None))),
            },
            ActionVerb::Withdraw => resolve_structure(target).and_then(|structure| {
                structure
                    .as_withdrawable()
                    .map(|w| action_code(creep.withdraw(w, ResourceType::Energy, None)))
            }),
            ActionVerb::Pickup => resolve::<Resource>(target).map(|r| action_code(creep.pickup(&r))),
            ActionVerb::Build => resolve::<ConstructionSite>(target).map(|s| action_code(creep.build(&s))),
            ActionVerb::Repair => resolve_structure(target).and_then(|structure| structure.as_repairable().map(|r| action_code(creep.repair(r)))),
            ActionVerb::Upgrade => resolve::<StructureController>(target).map(|c| action_code(creep.upgrade_controller(&c))),
            ActionVerb::Attack => match resolve::<Creep>(target) {
                Some(hostile) => Some(action_code(creep.attack(&hostile))),
                None => resolve_structure(target).and_then(|structure| structure.as_attackable().map(|a| action_code(creep.attack(a)))),
            },
        };

        code.unwrap_or(ActionCode::InvalidTarget)
    }

    fn spawn_unit(&mut self, spawn: &ObjectHandle, body: &[Part], name: &str) -> ActionCode {
        match resolve::<StructureSpawn>(spawn) {
            Some(spawn) => action_code(spawn.spawn_creep(body, name)),
            None => ActionCode::InvalidTarget,
        }
    }

    fn create_construction_site(&mut self, pos: Position, structure_type: StructureType) -> ActionCode {
        action_code(pos.create_construction_site(structure_type, None))
    }
}

/// Game memory, parsed once per tick from the raw memory string and written
/// back at the end of the tick.
pub fn load_memory() -> JsonMemory {
    JsonMemory::load(&String::from(raw_memory::get()))
}

pub fn save_memory(memory: &JsonMemory) {
    raw_memory::set(&js_sys::JsString::from(memory.save()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_errors_map_to_action_codes() {
        assert_eq!(action_code::<HarvestErrorCode>(Ok(())), ActionCode::Ok);
        assert_eq!(action_code(Err(HarvestErrorCode::NotInRange)), ActionCode::NotInRange);
        assert_eq!(action_code(Err(HarvestErrorCode::NoBodypart)), ActionCode::NoBodyPart);
        assert_eq!(action_code(Err(CreepMoveDirectionErrorCode::Tired)), ActionCode::Tired);
        assert_eq!(action_code(Err(TransferErrorCode::Full)), ActionCode::Full);
        assert_eq!(action_code(Err(SpawnCreepErrorCode::NameExists)), ActionCode::NameExists);
        assert_eq!(action_code(Err(SpawnCreepErrorCode::NotEnoughEnergy)), ActionCode::NotEnoughResources);
        assert_eq!(
            action_code(Err(RoomPositionCreateConstructionSiteErrorCode::Full)),
            ActionCode::Full
        );
    }

    #[test]
    fn transient_codes_survive_the_mapping() {
        assert!(ActionCode::from(UpgradeControllerErrorCode::NotInRange).is_transient());
        assert!(ActionCode::from(BuildErrorCode::Busy).is_transient());
        assert!(!ActionCode::from(WithdrawErrorCode::NotEnoughResources).is_transient());
    }
}
