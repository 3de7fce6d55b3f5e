use crate::constants::*;
use crate::location::*;
use crate::world::*;
use screeps::{Position, RoomName, StructureType, Terrain};
use serde::{Deserialize, Serialize};

/// Dense per-tile traversal cost for one room. 255 is impassable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostMatrix {
    bits: Vec<u8>,
}

impl Default for CostMatrix {
    fn default() -> Self {
        CostMatrix::new()
    }
}

impl std::fmt::Debug for CostMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let blocked = self.bits.iter().filter(|c| **c == COST_MATRIX_BLOCKED).count();

        write!(f, "CostMatrix {{ blocked: {} }}", blocked)
    }
}

impl CostMatrix {
    pub fn new() -> CostMatrix {
        CostMatrix { bits: vec![0; ROOM_AREA] }
    }

    pub fn from_bits(bits: Vec<u8>) -> Result<CostMatrix, String> {
        if bits.len() != ROOM_AREA {
            return Err(format!("Expected {} cost matrix entries, got {}", ROOM_AREA, bits.len()));
        }

        Ok(CostMatrix { bits })
    }

    fn index(x: u8, y: u8) -> Option<usize> {
        if x < ROOM_SIZE && y < ROOM_SIZE {
            Some(y as usize * ROOM_SIZE as usize + x as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: u8, y: u8) -> u8 {
        Self::index(x, y).map(|i| self.bits[i]).unwrap_or(COST_MATRIX_BLOCKED)
    }

    pub fn set(&mut self, x: u8, y: u8, cost: u8) {
        if let Some(i) = Self::index(x, y) {
            self.bits[i] = cost;
        }
    }

    pub fn get_pos(&self, pos: Position) -> u8 {
        let (x, y) = coords(pos);

        self.get(x, y)
    }

    pub fn set_pos(&mut self, pos: Position, cost: u8) {
        let (x, y) = coords(pos);

        self.set(x, y, cost);
    }

    pub fn is_blocked(&self, x: u8, y: u8) -> bool {
        self.get(x, y) == COST_MATRIX_BLOCKED
    }

    /// Adds to a walkable tile, clamping into the walkable range. Blocked
    /// tiles stay blocked.
    pub fn add(&mut self, x: u8, y: u8, delta: u8) {
        let current = self.get(x, y);

        if current != COST_MATRIX_BLOCKED {
            let value = (current as u16 + delta as u16).clamp(1, COST_MATRIX_MAX_WALKABLE as u16);

            self.set(x, y, value as u8);
        }
    }

    pub fn add_pos(&mut self, pos: Position, delta: u8) {
        let (x, y) = coords(pos);

        self.add(x, y, delta);
    }

    /// Subtracts from a walkable tile, never dropping below 1.
    pub fn subtract_pos(&mut self, pos: Position, delta: u8) {
        let current = self.get_pos(pos);

        if current != COST_MATRIX_BLOCKED {
            self.set_pos(pos, current.saturating_sub(delta).max(1));
        }
    }

    /// Lowers a walkable tile to `cost` if it is currently more expensive.
    pub fn discount(&mut self, x: u8, y: u8, cost: u8) {
        let current = self.get(x, y);

        if current != COST_MATRIX_BLOCKED && cost < current {
            self.set(x, y, cost.max(1));
        }
    }

    pub fn block(&mut self, x: u8, y: u8) {
        self.set(x, y, COST_MATRIX_BLOCKED);
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }
}

/// Tuning for the base cost matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub plain: u8,
    pub swamp: u8,
    pub wall_buffer: u8,
    pub controller_zone: u8,
    pub controller_zone_range: u8,
    pub spawn_zone: u8,
    pub source_zone: u8,
    pub road: u8,
    pub container: u8,
    pub rampart: u8,
}

impl Default for CostWeights {
    fn default() -> Self {
        CostWeights {
            plain: 2,
            swamp: 10,
            wall_buffer: 1,
            controller_zone: 2,
            controller_zone_range: 3,
            spawn_zone: 3,
            source_zone: 2,
            road: 1,
            container: 2,
            rampart: 2,
        }
    }
}

impl CostWeights {
    /// Key identifying the parts of the weights that shape the terrain layer.
    pub fn terrain_key(&self) -> (u8, u8, u8) {
        (self.plain, self.swamp, self.wall_buffer)
    }
}

pub struct CostMatrixBuilder;

impl CostMatrixBuilder {
    /// Full base matrix for a room: terrain plus every static room object.
    pub fn build<W>(world: &W, room_name: RoomName, weights: &CostWeights) -> CostMatrix
    where
        W: WorldView + ?Sized,
    {
        let mut matrix = Self::terrain_layer(world, room_name, weights);

        Self::apply_room_objects(&mut matrix, world, room_name, weights);

        matrix
    }

    /// Mover independent terrain costs. Depends only on static terrain so it
    /// can be kept for the lifetime of the room.
    pub fn terrain_layer<W>(world: &W, room_name: RoomName, weights: &CostWeights) -> CostMatrix
    where
        W: WorldView + ?Sized,
    {
        let mut matrix = CostMatrix::new();

        for y in 0..ROOM_SIZE {
            for x in 0..ROOM_SIZE {
                let cost = match world.terrain(room_name, x, y) {
                    Terrain::Wall => COST_MATRIX_BLOCKED,
                    Terrain::Swamp => weights.swamp.max(1),
                    _ => weights.plain.max(1),
                };

                matrix.set(x, y, cost);
            }
        }

        if weights.wall_buffer > 0 {
            let mut buffered = Vec::new();

            for y in 0..ROOM_SIZE {
                for x in 0..ROOM_SIZE {
                    if matrix.is_blocked(x, y) {
                        continue;
                    }

                    let near_wall = ONE_OFFSET_SQUARE.iter().any(|(dx, dy)| {
                        let nx = x as i16 + *dx as i16;
                        let ny = y as i16 + *dy as i16;

                        (0..ROOM_SIZE as i16).contains(&nx)
                            && (0..ROOM_SIZE as i16).contains(&ny)
                            && world.terrain(room_name, nx as u8, ny as u8) == Terrain::Wall
                    });

                    if near_wall {
                        buffered.push((x, y));
                    }
                }
            }

            for (x, y) in buffered {
                matrix.add(x, y, weights.wall_buffer);
            }
        }

        matrix
    }

    /// Layers structures, construction sites and loitering zones on top of a
    /// terrain layer.
    pub fn apply_room_objects<W>(matrix: &mut CostMatrix, world: &W, room_name: RoomName, weights: &CostWeights)
    where
        W: WorldView + ?Sized,
    {
        let structures = world.structures(room_name);
        let sources = world.sources(room_name);
        let construction_sites = world.construction_sites(room_name);
        let controller = world.controller(room_name);

        if let Some(controller) = &controller {
            for pos in positions_in_range(controller.pos, weights.controller_zone_range) {
                matrix.add_pos(pos, weights.controller_zone);
            }
        }

        for spawn in structures.iter().filter(|s| s.structure_type == StructureType::Spawn) {
            for pos in neighbours(spawn.pos) {
                matrix.add_pos(pos, weights.spawn_zone);
            }
        }

        for source in &sources {
            for pos in neighbours(source.pos) {
                matrix.add_pos(pos, weights.source_zone);
            }
        }

        for structure in &structures {
            let (x, y) = coords(structure.pos);

            match structure.structure_type {
                StructureType::Road => matrix.discount(x, y, weights.road),
                StructureType::Container => matrix.discount(x, y, weights.container),
                StructureType::Rampart if structure.my => matrix.discount(x, y, weights.rampart),
                _ => {}
            }
        }

        for structure in structures.iter().filter(|s| !s.is_walkable()) {
            let (x, y) = coords(structure.pos);

            matrix.block(x, y);
        }

        for site in construction_sites.iter().filter(|s| !is_walkable_structure_type(s.structure_type)) {
            let (x, y) = coords(site.pos);

            matrix.block(x, y);
        }

        for source in &sources {
            matrix.set_pos(source.pos, COST_MATRIX_BLOCKED);
        }

        if let Some(controller) = &controller {
            matrix.set_pos(controller.pos, COST_MATRIX_BLOCKED);
        }
    }
}

pub fn is_walkable_structure_type(structure_type: StructureType) -> bool {
    matches!(structure_type, StructureType::Road | StructureType::Container | StructureType::Rampart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_clamps_and_preserves_blocked() {
        let mut matrix = CostMatrix::new();

        matrix.set(1, 1, 250);
        matrix.add(1, 1, 20);
        assert_eq!(matrix.get(1, 1), COST_MATRIX_MAX_WALKABLE);

        matrix.add(2, 2, 0);
        assert_eq!(matrix.get(2, 2), 1);

        matrix.block(3, 3);
        matrix.add(3, 3, 10);
        matrix.discount(3, 3, 1);
        assert!(matrix.is_blocked(3, 3));
    }

    #[test]
    fn discount_only_lowers() {
        let mut matrix = CostMatrix::new();

        matrix.set(5, 5, 2);
        matrix.discount(5, 5, 4);
        assert_eq!(matrix.get(5, 5), 2);

        matrix.discount(5, 5, 1);
        assert_eq!(matrix.get(5, 5), 1);
    }

    #[test]
    fn out_of_bounds_reads_blocked() {
        let matrix = CostMatrix::new();

        assert!(matrix.is_blocked(50, 0));
        assert!(CostMatrix::from_bits(vec![0; 10]).is_err());
    }
}
