use super::costmatrix::*;
use crate::cache::*;
use crate::memory::*;
use crate::serialize::*;
use crate::world::*;
use log::*;
use screeps::RoomName;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub const TERRAIN_MATRIX_KEY: &str = "terrainMatrix";

#[derive(Serialize, Deserialize)]
struct TerrainLayerData {
    weights: (u8, u8, u8),
    bits: Vec<u8>,
}

struct TerrainLayer {
    weights: (u8, u8, u8),
    matrix: Rc<CostMatrix>,
}

/// Owns the cost matrices of every room. The terrain layer is computed once
/// per room and weight set and persisted compressed; the full base matrix is
/// rebuilt on top of it whenever the tick cache expires or the weights change.
#[derive(Default)]
pub struct CostMatrixSystem {
    terrain_layers: HashMap<RoomName, TerrainLayer>,
    base_weights: HashMap<RoomName, CostWeights>,
    dirty: HashSet<RoomName>,
    cache: TickCache,
}

impl CostMatrixSystem {
    pub fn new() -> CostMatrixSystem {
        CostMatrixSystem::default()
    }

    pub fn terrain_layer<W>(&mut self, world: &W, memory: &dyn MemoryStore, room_name: RoomName, weights: &CostWeights) -> Rc<CostMatrix>
    where
        W: WorldView + ?Sized,
    {
        let key = weights.terrain_key();

        if let Some(layer) = self.terrain_layers.get(&room_name) {
            if layer.weights == key {
                return layer.matrix.clone();
            }

            debug!("Terrain weights changed for {}, recomputing", room_name);
        }

        let layer = match Self::load_terrain_layer(memory, room_name, weights) {
            Some(layer) => layer,
            None => {
                debug!("Computing terrain cost layer for {}", room_name);

                self.dirty.insert(room_name);

                CostMatrixBuilder::terrain_layer(world, room_name, weights)
            }
        };

        let layer = Rc::new(layer);

        self.terrain_layers.insert(
            room_name,
            TerrainLayer {
                weights: key,
                matrix: layer.clone(),
            },
        );

        layer
    }

    fn load_terrain_layer(memory: &dyn MemoryStore, room_name: RoomName, weights: &CostWeights) -> Option<CostMatrix> {
        let encoded: String = match get_typed(memory, &room_path(room_name, TERRAIN_MATRIX_KEY)) {
            Ok(encoded) => encoded?,
            Err(err) => {
                warn!("Discarding stored terrain layer for {}: {}", room_name, err);

                return None;
            }
        };

        let data: TerrainLayerData = decode_from_string(&encoded)
            .map_err(|err| warn!("Failed to decode terrain layer for {}: {}", room_name, err))
            .ok()?;

        if data.weights != weights.terrain_key() {
            debug!("Terrain weights changed for {}, recomputing", room_name);

            return None;
        }

        CostMatrix::from_bits(data.bits)
            .map_err(|err| warn!("Invalid terrain layer for {}: {}", room_name, err))
            .ok()
    }

    /// Base matrix for a room, shared by every mover for `ttl` ticks.
    pub fn base_matrix<W>(&mut self, world: &W, memory: &dyn MemoryStore, room_name: RoomName, weights: &CostWeights, ttl: u32) -> Rc<CostMatrix>
    where
        W: WorldView + ?Sized,
    {
        let terrain = self.terrain_layer(world, memory, room_name, weights);

        if self.base_weights.get(&room_name) != Some(weights) {
            self.invalidate(room_name);
            self.base_weights.insert(room_name, weights.clone());
        }

        self.cache.get(&Self::base_key(room_name), world.time(), ttl, || {
            let mut matrix = (*terrain).clone();

            CostMatrixBuilder::apply_room_objects(&mut matrix, world, room_name, weights);

            matrix
        })
    }

    /// Forces the next `base_matrix` call for the room to rebuild.
    pub fn invalidate(&mut self, room_name: RoomName) {
        self.cache.invalidate(&Self::base_key(room_name));
    }

    pub fn purge(&mut self, now: u32) {
        self.cache.purge(now);
    }

    /// Writes newly computed terrain layers back to memory.
    pub fn flush_storage(&mut self, memory: &mut dyn MemoryStore) {
        for room_name in self.dirty.drain() {
            let Some(layer) = self.terrain_layers.get(&room_name) else {
                continue;
            };

            let data = TerrainLayerData {
                weights: layer.weights,
                bits: layer.matrix.bits().to_vec(),
            };

            match encode_to_string(&data) {
                Ok(encoded) => memory.set(&room_path(room_name, TERRAIN_MATRIX_KEY), serde_json::Value::String(encoded)),
                Err(err) => warn!("Failed to encode terrain layer for {}: {}", room_name, err),
            }
        }
    }

    fn base_key(room_name: RoomName) -> String {
        format!("base_matrix_{}", room_name)
    }
}
