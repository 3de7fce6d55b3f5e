use super::costmatrix::*;
use super::overlay::*;
use super::pathfinder::*;
use crate::location::*;
use crate::world::*;
use log::*;
use screeps::{Position, RoomName};
use serde::{Deserialize, Serialize};

pub const TRAVEL_STATE_KEY: &str = "travelState";

/// Outcome of a single travel step for a unit.
#[derive(Clone, Debug, PartialEq)]
pub enum MovementResult {
    /// Moved one step toward the target.
    Moving,
    /// Already within range of the target.
    Arrived,
    /// Fatigued; nothing was attempted.
    Tired,
    /// Moved, but recent attempts did not change position.
    Stuck { ticks: u32 },
    Failed(MovementFailure),
}

#[derive(Clone, Debug, PartialEq)]
pub enum MovementFailure {
    /// The pathfinder returned an incomplete or empty path.
    PathNotFound,
    /// Stuck for long enough that the travel attempt was abandoned.
    StuckTimeout { ticks: u32 },
    InternalError(String),
}

/// Observable travel state, derived from the persisted `TravelState`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TravelStatus {
    Uninitialized,
    Active,
    Stuck,
    Arrived,
}

/// Persisted per-unit travel progress. Stored under the unit's
/// `travelState` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelState {
    pub stuck_counter: u32,
    pub last_position: Position,
    /// Remaining direction codes, next step first.
    pub path: String,
    pub destination: Position,
    pub distance_remaining: u32,
    pub target: Position,
    pub range: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_step: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move_tick: Option<u32>,
}

impl TravelState {
    pub fn new(pos: Position, target: Position, range: u32) -> TravelState {
        TravelState {
            stuck_counter: 0,
            last_position: pos,
            path: String::new(),
            destination: target,
            distance_remaining: 0,
            target,
            range,
            last_step: None,
            last_move_tick: None,
        }
    }

    /// Records the position seen after a move attempt. Returns true if the
    /// unit moved.
    pub fn observe(&mut self, current: Position) -> bool {
        if current == self.last_position {
            self.stuck_counter += 1;

            false
        } else {
            self.stuck_counter = 0;

            true
        }
    }

    pub fn invalidate_path(&mut self) {
        self.path.clear();
        self.last_step = None;
        self.distance_remaining = 0;
    }

    /// Position the last issued step should have led to.
    pub fn expected_position(&self) -> Option<Position> {
        let code = self.last_step?;

        step(self.last_position, direction_from_code(code)?)
    }

    pub fn set_path(&mut self, path: String, destination: Position) {
        self.distance_remaining = path.chars().count() as u32;
        self.path = path;
        self.destination = destination;
    }

    fn commit_step(&mut self, from: Position, code: char, now: u32) {
        self.path.remove(0);
        self.distance_remaining = self.path.chars().count() as u32;
        self.last_position = from;
        self.last_step = Some(code);
        self.last_move_tick = Some(now);
    }

    pub fn status(&self, current: Position, stuck_threshold: u32) -> TravelStatus {
        if in_range(current, self.target, self.range) {
            TravelStatus::Arrived
        } else if self.stuck_counter >= stuck_threshold {
            TravelStatus::Stuck
        } else if self.path.is_empty() {
            TravelStatus::Uninitialized
        } else {
            TravelStatus::Active
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathingConfig {
    /// Consecutive unproductive move attempts before the path is replanned.
    pub stuck_threshold: u32,
    pub max_ops: u32,
    /// Reuse stored paths across ticks instead of replanning every move.
    pub use_cache: bool,
    /// Ticks a base cost matrix stays valid.
    pub matrix_ttl: u32,
}

impl Default for PathingConfig {
    fn default() -> Self {
        PathingConfig {
            stuck_threshold: 4,
            max_ops: 2000,
            use_cache: true,
            matrix_ttl: 1,
        }
    }
}

/// Receives travel intents for drawing. Rendering is left to the implementor.
pub trait MovementVisualizer {
    fn visualize_path(&mut self, unit_pos: Position, path: &[Position]);

    fn visualize_stuck(&mut self, unit_pos: Position, ticks: u32);

    fn visualize_failed(&mut self, unit_pos: Position);
}

/// Moves units along cached paths planned over the room's base matrix with
/// traffic layered on top.
pub struct Traveler<'a> {
    pub tick: u32,
    pub base: &'a CostMatrix,
    pub controller: Option<Position>,
    pub traffic: &'a TrafficSnapshot,
    pub pathfinder: &'a mut dyn PathfindingProvider,
    pub config: &'a PathingConfig,
    pub overlay: &'a OverlayOptions,
    pub visualizer: Option<&'a mut dyn MovementVisualizer>,
}

impl<'a> Traveler<'a> {
    pub fn travel_to<G>(&mut self, game: &mut G, unit: &UnitInfo, state: &mut Option<TravelState>, target: Position, range: u32) -> MovementResult
    where
        G: UnitActions + ?Sized,
    {
        let pos = unit.pos;

        if in_range(pos, target, range) {
            *state = None;

            return MovementResult::Arrived;
        }

        if unit.fatigue > 0 {
            return MovementResult::Tired;
        }

        let reset = match state {
            Some(current) => current.target != target || current.range != range,
            None => true,
        };

        if reset {
            *state = Some(TravelState::new(pos, target, range));
        }

        let Some(travel) = state.as_mut() else {
            return MovementResult::Failed(MovementFailure::InternalError("Expected travel state".to_string()));
        };

        let now = self.tick;

        if travel.last_move_tick.is_some() && travel.last_move_tick == now.checked_sub(1) {
            if travel.observe(pos) {
                if travel.expected_position() != Some(pos) {
                    travel.invalidate_path();
                }
            } else if let Some(code) = travel.last_step {
                travel.path.insert(0, code);
                travel.distance_remaining += 1;
            }

            travel.last_step = None;
        }

        let threshold = self.config.stuck_threshold.max(1);

        if travel.stuck_counter > threshold * 2 {
            let ticks = travel.stuck_counter;

            warn!("{} abandoning travel to {} after {} stuck ticks", unit.name, target, ticks);

            if let Some(visualizer) = self.visualizer.as_deref_mut() {
                visualizer.visualize_failed(pos);
            }

            *state = None;

            return MovementResult::Failed(MovementFailure::StuckTimeout { ticks });
        }

        if travel.status(pos, threshold) == TravelStatus::Stuck {
            debug!("{} stuck for {} ticks, replanning", unit.name, travel.stuck_counter);

            travel.invalidate_path();
        }

        let destination_taken = !travel.path.is_empty() && self.traffic.parked_at(travel.destination, &unit.name);

        if travel.path.is_empty() || !self.config.use_cache || destination_taken {
            match self.plan(unit, target, range) {
                Some((path, destination)) => travel.set_path(path, destination),
                None => {
                    travel.invalidate_path();
                    travel.stuck_counter += 1;

                    debug!("{} found no path to {}", unit.name, target);

                    if let Some(visualizer) = self.visualizer.as_deref_mut() {
                        visualizer.visualize_failed(pos);
                    }

                    return MovementResult::Failed(MovementFailure::PathNotFound);
                }
            }
        }

        let Some(code) = travel.path.chars().next() else {
            return MovementResult::Failed(MovementFailure::PathNotFound);
        };

        let Some(direction) = direction_from_code(code) else {
            travel.invalidate_path();

            return MovementResult::Failed(MovementFailure::InternalError(format!("Invalid path code {}", code)));
        };

        if let Some(visualizer) = self.visualizer.as_deref_mut() {
            visualizer.visualize_path(pos, &walk_path(pos, &travel.path));

            if travel.stuck_counter > 0 {
                visualizer.visualize_stuck(pos, travel.stuck_counter);
            }
        }

        match game.move_direction(&unit.name, direction) {
            ActionCode::Ok => {
                travel.commit_step(pos, code, now);

                if travel.stuck_counter > 0 {
                    MovementResult::Stuck {
                        ticks: travel.stuck_counter,
                    }
                } else {
                    MovementResult::Moving
                }
            }
            ActionCode::Tired => MovementResult::Tired,
            code => {
                travel.last_position = pos;
                travel.last_step = None;
                travel.last_move_tick = Some(now);

                MovementResult::Failed(MovementFailure::InternalError(format!("Move failed: {:?}", code)))
            }
        }
    }

    fn plan(&mut self, unit: &UnitInfo, target: Position, range: u32) -> Option<(String, Position)> {
        let room_name = unit.pos.room_name();

        let matrix = overlay_traffic(self.base, &unit.name, unit.pos, self.traffic, self.controller, self.overlay);

        let mut callback = move |requested: RoomName| if requested == room_name { Some(matrix.clone()) } else { None };

        let result = self.pathfinder.search(unit.pos, target, range, &mut callback, self.config.max_ops, 1);

        if result.incomplete || result.path.is_empty() {
            return None;
        }

        let destination = *result.path.last()?;
        let encoded = encode_path(unit.pos, &result.path)?;

        trace!("{} planned {} steps to {} ({} ops)", unit.name, encoded.len(), destination, result.ops);

        Some((encoded, destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: u8, y: u8) -> Position {
        make_position(x, y, RoomName::new("W1N1").unwrap()).unwrap()
    }

    #[test]
    fn observe_counts_unchanged_positions() {
        let mut state = TravelState::new(pos(10, 10), pos(20, 20), 1);

        assert!(!state.observe(pos(10, 10)));
        assert!(!state.observe(pos(10, 10)));
        assert_eq!(state.stuck_counter, 2);

        assert!(state.observe(pos(11, 11)));
        assert_eq!(state.stuck_counter, 0);
    }

    #[test]
    fn expected_position_follows_last_step() {
        let mut state = TravelState::new(pos(10, 10), pos(10, 20), 1);

        state.set_path("555".to_string(), pos(10, 13));
        state.commit_step(pos(10, 10), '5', 7);

        assert_eq!(state.path, "55");
        assert_eq!(state.distance_remaining, 2);
        assert_eq!(state.expected_position(), Some(pos(10, 11)));
        assert_eq!(state.last_move_tick, Some(7));
    }

    #[test]
    fn status_reflects_progress() {
        let mut state = TravelState::new(pos(10, 10), pos(10, 20), 1);

        assert_eq!(state.status(pos(10, 10), 4), TravelStatus::Uninitialized);

        state.set_path("5".to_string(), pos(10, 11));
        assert_eq!(state.status(pos(10, 10), 4), TravelStatus::Active);

        state.stuck_counter = 4;
        assert_eq!(state.status(pos(10, 10), 4), TravelStatus::Stuck);
        assert_eq!(state.status(pos(10, 19), 4), TravelStatus::Arrived);
    }

    #[test]
    fn persisted_field_names() {
        let state = TravelState::new(pos(1, 2), pos(3, 4), 1);
        let value = serde_json::to_value(&state).unwrap();

        for key in ["stuckCounter", "lastPosition", "path", "destination", "distanceRemaining"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }

        let restored: TravelState = serde_json::from_value(value).unwrap();
        assert_eq!(restored, state);
    }
}
