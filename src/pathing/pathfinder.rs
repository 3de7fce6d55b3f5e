use super::costmatrix::*;
use crate::constants::*;
use crate::location::*;
use pathfinding::directed::astar::astar;
use screeps::{Position, RoomName};
use std::cell::Cell;

/// Tile costs are scaled so that a diagonal tie-break can be added without
/// ever outweighing a real cost difference.
const STEP_SCALE: u32 = 256;
const DIAGONAL_PENALTY: u32 = 1;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathfindingResult {
    /// Waypoints from the tile after the origin up to and including the last tile.
    pub path: Vec<Position>,
    pub ops: u32,
    pub cost: u32,
    pub incomplete: bool,
}

impl PathfindingResult {
    fn incomplete(ops: u32) -> PathfindingResult {
        PathfindingResult {
            path: Vec::new(),
            ops,
            cost: 0,
            incomplete: true,
        }
    }
}

pub trait PathfindingProvider {
    /// Searches from `origin` to any tile within `range` of `goal`. The room
    /// callback supplies the cost matrix for each room the search enters;
    /// returning `None` forbids the room.
    fn search(
        &mut self,
        origin: Position,
        goal: Position,
        range: u32,
        room_callback: &mut dyn FnMut(RoomName) -> Option<CostMatrix>,
        max_ops: u32,
        max_rooms: u32,
    ) -> PathfindingResult;
}

/// Single room A* over a cost matrix.
#[derive(Default)]
pub struct GridPathfinder;

impl GridPathfinder {
    pub fn new() -> GridPathfinder {
        GridPathfinder
    }
}

impl PathfindingProvider for GridPathfinder {
    fn search(
        &mut self,
        origin: Position,
        goal: Position,
        range: u32,
        room_callback: &mut dyn FnMut(RoomName) -> Option<CostMatrix>,
        max_ops: u32,
        max_rooms: u32,
    ) -> PathfindingResult {
        let room_name = origin.room_name();

        if goal.room_name() != room_name || max_rooms == 0 {
            return PathfindingResult::incomplete(0);
        }

        if in_range(origin, goal, range) {
            return PathfindingResult::default();
        }

        let matrix = match room_callback(room_name) {
            Some(matrix) => matrix,
            None => return PathfindingResult::incomplete(0),
        };

        let (gx, gy) = coords(goal);
        let chebyshev = |x: u8, y: u8| -> u32 { (x as i32 - gx as i32).unsigned_abs().max((y as i32 - gy as i32).unsigned_abs()) };

        let ops = Cell::new(0u32);

        let result = astar(
            &coords(origin),
            |&(x, y)| {
                if ops.get() >= max_ops {
                    return Vec::new();
                }

                ops.set(ops.get() + 1);

                ONE_OFFSET_SQUARE
                    .iter()
                    .filter_map(|(dx, dy)| {
                        let nx = x as i16 + *dx as i16;
                        let ny = y as i16 + *dy as i16;

                        if !(0..ROOM_SIZE as i16).contains(&nx) || !(0..ROOM_SIZE as i16).contains(&ny) {
                            return None;
                        }

                        let (nx, ny) = (nx as u8, ny as u8);

                        let cost = matrix.get(nx, ny);

                        if cost == COST_MATRIX_BLOCKED {
                            return None;
                        }

                        if is_room_edge(nx, ny) && chebyshev(nx, ny) > range {
                            return None;
                        }

                        let diagonal = if *dx != 0 && *dy != 0 { DIAGONAL_PENALTY } else { 0 };

                        Some(((nx, ny), cost.max(1) as u32 * STEP_SCALE + diagonal))
                    })
                    .collect::<Vec<_>>()
            },
            |&(x, y)| chebyshev(x, y).saturating_sub(range) * STEP_SCALE,
            |&(x, y)| chebyshev(x, y) <= range,
        );

        match result {
            Some((nodes, cost)) => {
                let path: Vec<Position> = nodes.into_iter().skip(1).filter_map(|(x, y)| make_position(x, y, room_name)).collect();

                PathfindingResult {
                    path,
                    ops: ops.get(),
                    cost: cost / STEP_SCALE,
                    incomplete: false,
                }
            }
            None => PathfindingResult::incomplete(ops.get()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomName {
        RoomName::new("W1N1").unwrap()
    }

    fn pos(x: u8, y: u8) -> Position {
        make_position(x, y, room()).unwrap()
    }

    fn search(matrix: CostMatrix, from: Position, to: Position, range: u32) -> PathfindingResult {
        let mut callback = move |_: RoomName| Some(matrix.clone());

        GridPathfinder::new().search(from, to, range, &mut callback, 2000, 1)
    }

    #[test]
    fn straight_path_preferred_on_ties() {
        let matrix = CostMatrix::from_bits(vec![2; ROOM_AREA]).unwrap();

        let result = search(matrix, pos(10, 10), pos(10, 13), 1);

        assert!(!result.incomplete);
        assert_eq!(result.path, vec![pos(10, 11), pos(10, 12)]);
        assert_eq!(result.cost, 4);
    }

    #[test]
    fn routes_around_blocked_tiles() {
        let mut matrix = CostMatrix::from_bits(vec![2; ROOM_AREA]).unwrap();
        for x in 5..=15 {
            matrix.block(x, 12);
        }

        let result = search(matrix.clone(), pos(10, 10), pos(10, 14), 0);

        assert!(!result.incomplete);
        assert_eq!(result.path.last(), Some(&pos(10, 14)));
        assert!(result.path.iter().all(|p| matrix.get_pos(*p) != COST_MATRIX_BLOCKED));
    }

    #[test]
    fn enclosed_goal_is_incomplete() {
        let mut matrix = CostMatrix::from_bits(vec![2; ROOM_AREA]).unwrap();
        for p in neighbours(pos(30, 30)) {
            matrix.set_pos(p, COST_MATRIX_BLOCKED);
        }

        let result = search(matrix, pos(10, 10), pos(30, 30), 0);

        assert!(result.incomplete);
        assert!(result.path.is_empty());
    }

    #[test]
    fn already_in_range_is_empty_and_complete() {
        let matrix = CostMatrix::from_bits(vec![2; ROOM_AREA]).unwrap();

        let result = search(matrix, pos(10, 10), pos(11, 11), 1);

        assert!(!result.incomplete);
        assert!(result.path.is_empty());
    }

    #[test]
    fn other_rooms_are_not_searched() {
        let matrix = CostMatrix::from_bits(vec![2; ROOM_AREA]).unwrap();
        let other = make_position(10, 10, RoomName::new("W2N1").unwrap()).unwrap();

        assert!(search(matrix, pos(10, 10), other, 1).incomplete);
    }
}
