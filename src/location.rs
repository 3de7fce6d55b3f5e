use crate::constants::*;
use screeps::{Direction, Position, RoomCoordinate, RoomName};

pub const ONE_OFFSET_SQUARE: &[(i8, i8)] = &[(-1, -1), (-1, 0), (-1, 1), (0, 1), (1, 1), (1, 0), (1, -1), (0, -1)];

pub const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::Top,
    Direction::TopRight,
    Direction::Right,
    Direction::BottomRight,
    Direction::Bottom,
    Direction::BottomLeft,
    Direction::Left,
    Direction::TopLeft,
];

pub fn make_position(x: u8, y: u8, room_name: RoomName) -> Option<Position> {
    let x = RoomCoordinate::new(x).ok()?;
    let y = RoomCoordinate::new(y).ok()?;

    Some(Position::new(x, y, room_name))
}

pub fn coords(pos: Position) -> (u8, u8) {
    (pos.x().u8(), pos.y().u8())
}

pub fn is_room_edge(x: u8, y: u8) -> bool {
    x == 0 || y == 0 || x == ROOM_SIZE - 1 || y == ROOM_SIZE - 1
}

/// Chebyshev distance between two positions. Positions in different rooms are
/// treated as unreachably far apart since all movement is bounded to one room.
pub fn range_between(a: Position, b: Position) -> u32 {
    if a.room_name() != b.room_name() {
        return u32::MAX;
    }

    let (ax, ay) = coords(a);
    let (bx, by) = coords(b);

    let dx = (ax as i32 - bx as i32).unsigned_abs();
    let dy = (ay as i32 - by as i32).unsigned_abs();

    dx.max(dy)
}

pub fn in_range(a: Position, b: Position, range: u32) -> bool {
    range_between(a, b) <= range
}

pub fn offset(pos: Position, dx: i8, dy: i8) -> Option<Position> {
    let (x, y) = coords(pos);

    let nx = x as i16 + dx as i16;
    let ny = y as i16 + dy as i16;

    if !(0..ROOM_SIZE as i16).contains(&nx) || !(0..ROOM_SIZE as i16).contains(&ny) {
        return None;
    }

    make_position(nx as u8, ny as u8, pos.room_name())
}

pub fn direction_offset(direction: Direction) -> (i8, i8) {
    match direction {
        Direction::Top => (0, -1),
        Direction::TopRight => (1, -1),
        Direction::Right => (1, 0),
        Direction::BottomRight => (1, 1),
        Direction::Bottom => (0, 1),
        Direction::BottomLeft => (-1, 1),
        Direction::Left => (-1, 0),
        Direction::TopLeft => (-1, -1),
    }
}

pub fn step(pos: Position, direction: Direction) -> Option<Position> {
    let (dx, dy) = direction_offset(direction);

    offset(pos, dx, dy)
}

/// Direction of a single step between two adjacent positions.
pub fn direction_to(from: Position, to: Position) -> Option<Direction> {
    if from.room_name() != to.room_name() {
        return None;
    }

    let (fx, fy) = coords(from);
    let (tx, ty) = coords(to);

    let dx = (tx as i16 - fx as i16).signum() as i8;
    let dy = (ty as i16 - fy as i16).signum() as i8;

    ALL_DIRECTIONS.iter().copied().find(|d| direction_offset(*d) == (dx, dy))
}

pub fn direction_code(direction: Direction) -> char {
    match direction {
        Direction::Top => '1',
        Direction::TopRight => '2',
        Direction::Right => '3',
        Direction::BottomRight => '4',
        Direction::Bottom => '5',
        Direction::BottomLeft => '6',
        Direction::Left => '7',
        Direction::TopLeft => '8',
    }
}

pub fn direction_from_code(code: char) -> Option<Direction> {
    match code {
        '1' => Some(Direction::Top),
        '2' => Some(Direction::TopRight),
        '3' => Some(Direction::Right),
        '4' => Some(Direction::BottomRight),
        '5' => Some(Direction::Bottom),
        '6' => Some(Direction::BottomLeft),
        '7' => Some(Direction::Left),
        '8' => Some(Direction::TopLeft),
        _ => None,
    }
}

/// Compacts a waypoint sequence into direction codes. Every waypoint must be
/// adjacent to the previous one (the first to `origin`).
pub fn encode_path(origin: Position, path: &[Position]) -> Option<String> {
    let mut encoded = String::with_capacity(path.len());
    let mut current = origin;

    for next in path {
        if range_between(current, *next) != 1 {
            return None;
        }

        encoded.push(direction_code(direction_to(current, *next)?));

        current = *next;
    }

    Some(encoded)
}

/// Expands a direction string back into the positions it visits, stopping at
/// the first invalid code or room boundary.
pub fn walk_path(origin: Position, path: &str) -> Vec<Position> {
    let mut positions = Vec::with_capacity(path.len());
    let mut current = origin;

    for code in path.chars() {
        match direction_from_code(code).and_then(|d| step(current, d)) {
            Some(next) => {
                positions.push(next);
                current = next;
            }
            None => break,
        }
    }

    positions
}

pub fn neighbours(pos: Position) -> impl Iterator<Item = Position> {
    ONE_OFFSET_SQUARE.iter().filter_map(move |(dx, dy)| offset(pos, *dx, *dy))
}

pub fn positions_in_range(pos: Position, range: u8) -> impl Iterator<Item = Position> {
    let range = range as i8;

    (-range..=range).flat_map(move |dx| (-range..=range).filter_map(move |dy| offset(pos, dx, dy)))
}
