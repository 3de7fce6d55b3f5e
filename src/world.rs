use crate::tasks::data::ActionVerb;
use screeps::{Direction, Part, Position, RoomName, StructureType, Terrain};
use serde::{Deserialize, Serialize};
use shrinkwraprs::*;

/// Opaque game object id. Ids of destroyed objects stop resolving.
#[derive(Shrinkwrap, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub String);

impl ObjectHandle {
    pub fn new(id: impl Into<String>) -> ObjectHandle {
        ObjectHandle(id.into())
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Energy inventory. The agent only moves energy around so a single
/// used/capacity pair is enough.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub used: u32,
    pub capacity: u32,
}

impl Store {
    pub fn new(used: u32, capacity: u32) -> Store {
        Store { used, capacity }
    }

    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.free() == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnitInfo {
    pub name: String,
    pub id: ObjectHandle,
    pub pos: Position,
    pub fatigue: u32,
    pub body: Vec<Part>,
    pub store: Store,
    pub my: bool,
    pub spawning: bool,
}

impl UnitInfo {
    pub fn count_parts(&self, part: Part) -> u32 {
        self.body.iter().filter(|p| **p == part).count() as u32
    }

    pub fn has_part(&self, part: Part) -> bool {
        self.body.iter().any(|p| *p == part)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructureInfo {
    pub id: ObjectHandle,
    pub structure_type: StructureType,
    pub pos: Position,
    pub store: Option<Store>,
    pub hits: u32,
    pub hits_max: u32,
    pub my: bool,
    pub spawning: bool,
}

impl StructureInfo {
    /// Structures a unit can stand on.
    pub fn is_walkable(&self) -> bool {
        match self.structure_type {
            StructureType::Road | StructureType::Container => true,
            StructureType::Rampart => self.my,
            _ => false,
        }
    }

    pub fn accepts_energy(&self) -> bool {
        self.store.map(|s| s.free() > 0).unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub id: ObjectHandle,
    pub pos: Position,
    pub energy: u32,
    pub energy_capacity: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstructionSiteInfo {
    pub id: ObjectHandle,
    pub pos: Position,
    pub structure_type: StructureType,
    pub progress: u32,
    pub progress_total: u32,
    pub my: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerInfo {
    pub id: ObjectHandle,
    pub pos: Position,
    pub level: u8,
    pub my: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DroppedResourceInfo {
    pub id: ObjectHandle,
    pub pos: Position,
    pub amount: u32,
}

/// Result of resolving an id against the live world.
#[derive(Clone, Debug, PartialEq)]
pub enum RoomObject {
    Unit(UnitInfo),
    Structure(StructureInfo),
    Source(SourceInfo),
    ConstructionSite(ConstructionSiteInfo),
    Controller(ControllerInfo),
    DroppedResource(DroppedResourceInfo),
}

impl RoomObject {
    pub fn pos(&self) -> Position {
        match self {
            RoomObject::Unit(u) => u.pos,
            RoomObject::Structure(s) => s.pos,
            RoomObject::Source(s) => s.pos,
            RoomObject::ConstructionSite(c) => c.pos,
            RoomObject::Controller(c) => c.pos,
            RoomObject::DroppedResource(r) => r.pos,
        }
    }

    pub fn id(&self) -> &ObjectHandle {
        match self {
            RoomObject::Unit(u) => &u.id,
            RoomObject::Structure(s) => &s.id,
            RoomObject::Source(s) => &s.id,
            RoomObject::ConstructionSite(c) => &c.id,
            RoomObject::Controller(c) => &c.id,
            RoomObject::DroppedResource(r) => &r.id,
        }
    }

    /// Energy storage of the object, if it has one.
    pub fn store(&self) -> Option<Store> {
        match self {
            RoomObject::Unit(u) => Some(u.store),
            RoomObject::Structure(s) => s.store,
            _ => None,
        }
    }
}

/// Outcome code of a world action.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActionCode {
    Ok,
    NotInRange,
    Tired,
    Busy,
    NotEnoughResources,
    Full,
    InvalidTarget,
    NoBodyPart,
    NotOwner,
    NoPath,
    NameExists,
    Failed,
}

impl ActionCode {
    /// Codes that mean "try again later" rather than "give up".
    pub fn is_transient(self) -> bool {
        matches!(self, ActionCode::NotInRange | ActionCode::Tired | ActionCode::Busy)
    }
}

/// Read-only query surface over the live game.
pub trait WorldView {
    fn time(&self) -> u32;

    /// Rooms containing a controller owned by the agent.
    fn owned_rooms(&self) -> Vec<RoomName>;

    fn terrain(&self, room_name: RoomName, x: u8, y: u8) -> Terrain;

    fn units(&self, room_name: RoomName) -> Vec<UnitInfo>;

    fn structures(&self, room_name: RoomName) -> Vec<StructureInfo>;

    fn sources(&self, room_name: RoomName) -> Vec<SourceInfo>;

    fn construction_sites(&self, room_name: RoomName) -> Vec<ConstructionSiteInfo>;

    fn dropped_resources(&self, room_name: RoomName) -> Vec<DroppedResourceInfo>;

    fn controller(&self, room_name: RoomName) -> Option<ControllerInfo>;

    /// Energy available for spawning and the room's total spawn energy capacity.
    fn room_energy(&self, room_name: RoomName) -> (u32, u32);

    fn get_object(&self, id: &ObjectHandle) -> Option<RoomObject>;

    fn unit(&self, name: &str) -> Option<UnitInfo>;

    /// Names of every unit the agent controls, in every room.
    fn unit_names(&self) -> Vec<String>;
}

/// Intents issued against the live game.
pub trait UnitActions {
    fn move_direction(&mut self, unit: &str, direction: Direction) -> ActionCode;

    fn act(&mut self, unit: &str, verb: ActionVerb, target: &ObjectHandle) -> ActionCode;

    fn spawn_unit(&mut self, spawn: &ObjectHandle, body: &[Part], name: &str) -> ActionCode;

    fn create_construction_site(&mut self, pos: Position, structure_type: StructureType) -> ActionCode;
}

/// Everything the tick driver needs from the game.
pub trait Game: WorldView + UnitActions {}

impl<T: WorldView + UnitActions> Game for T {}
