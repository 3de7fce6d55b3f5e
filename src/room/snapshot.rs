use crate::location::*;
use crate::world::*;
use screeps::{Position, RoomName, StructureType, Terrain};
use std::cell::RefCell;
use std::collections::HashMap;

/// Room objects captured once per tick and shared by every unit in the room.
pub struct RoomSnapshot {
    pub room_name: RoomName,
    pub units: Vec<UnitInfo>,
    pub structures: Vec<StructureInfo>,
    pub sources: Vec<SourceInfo>,
    pub construction_sites: Vec<ConstructionSiteInfo>,
    pub dropped_resources: Vec<DroppedResourceInfo>,
    pub controller: Option<ControllerInfo>,
    terrain: Vec<Terrain>,
    walkable_adjacent: RefCell<HashMap<Position, u32>>,
}

impl RoomSnapshot {
    pub fn capture<W>(world: &W, room_name: RoomName) -> RoomSnapshot
    where
        W: WorldView + ?Sized,
    {
        let mut terrain = Vec::with_capacity(crate::constants::ROOM_AREA);

        for y in 0..crate::constants::ROOM_SIZE {
            for x in 0..crate::constants::ROOM_SIZE {
                terrain.push(world.terrain(room_name, x, y));
            }
        }

        RoomSnapshot {
            room_name,
            units: world.units(room_name),
            structures: world.structures(room_name),
            sources: world.sources(room_name),
            construction_sites: world.construction_sites(room_name),
            dropped_resources: world.dropped_resources(room_name),
            controller: world.controller(room_name),
            terrain,
            walkable_adjacent: RefCell::new(HashMap::new()),
        }
    }

    pub fn terrain(&self, pos: Position) -> Terrain {
        let (x, y) = coords(pos);

        self.terrain
            .get(y as usize * crate::constants::ROOM_SIZE as usize + x as usize)
            .copied()
            .unwrap_or(Terrain::Wall)
    }

    pub fn hostiles(&self) -> impl Iterator<Item = &UnitInfo> {
        self.units.iter().filter(|u| !u.my)
    }

    pub fn my_structures_of(&self, structure_type: StructureType) -> impl Iterator<Item = &StructureInfo> {
        self.structures.iter().filter(move |s| s.my && s.structure_type == structure_type)
    }

    /// Tiles around `pos` a unit could stand on, ignoring units.
    pub fn walkable_adjacent(&self, pos: Position) -> u32 {
        if let Some(count) = self.walkable_adjacent.borrow().get(&pos) {
            return *count;
        }

        let count = neighbours(pos)
            .filter(|p| self.terrain(*p) != Terrain::Wall)
            .filter(|p| !self.structures.iter().any(|s| s.pos == *p && !s.is_walkable()))
            .count() as u32;

        self.walkable_adjacent.borrow_mut().insert(pos, count);

        count
    }

    pub fn find(&self, id: &ObjectHandle) -> Option<RoomObject> {
        self.structures
            .iter()
            .find(|s| &s.id == id)
            .map(|s| RoomObject::Structure(s.clone()))
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
            .or_else(|| self.units.iter().find(|u| &u.id == id).map(|u| RoomObject::Unit(u.clone())))
    }
}
