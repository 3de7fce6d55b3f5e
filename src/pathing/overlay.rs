use super::costmatrix::*;
use crate::constants::*;
use crate::location::*;
use itertools::*;
use screeps::{Position, RoomName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a unit is and where it is heading, as seen at the start of its turn.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitTraffic {
    pub name: String,
    pub pos: Position,
    pub path: Option<String>,
    pub destination: Option<Position>,
    pub has_task: bool,
}

impl UnitTraffic {
    /// A unit with no active travel state or nothing to do is treated as
    /// stationary.
    pub fn is_parked(&self) -> bool {
        self.destination.is_none() || !self.has_task
    }
}

/// Per-tick view of every controlled unit's movement, kept current as units
/// act so later movers see earlier moves.
#[derive(Clone, Debug, Default)]
pub struct TrafficSnapshot {
    units: HashMap<String, UnitTraffic>,
}

impl TrafficSnapshot {
    pub fn new() -> TrafficSnapshot {
        TrafficSnapshot::default()
    }

    pub fn update(&mut self, traffic: UnitTraffic) {
        self.units.insert(traffic.name.clone(), traffic);
    }

    pub fn remove(&mut self, name: &str) {
        self.units.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&UnitTraffic> {
        self.units.get(name)
    }

    pub fn in_room(&self, room_name: RoomName) -> impl Iterator<Item = &UnitTraffic> {
        self.units.values().filter(move |u| u.pos.room_name() == room_name)
    }

    pub fn parked_at(&self, pos: Position, except: &str) -> bool {
        self.units.values().any(|u| u.name != except && u.pos == pos && u.is_parked())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    pub destination_cost: u8,
    pub controller_range: u8,
    pub grouping_discount: u8,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        OverlayOptions {
            destination_cost: 10,
            controller_range: 3,
            grouping_discount: 2,
        }
    }
}

/// Copies `base` and layers the movement intentions of every unit except
/// `mover` on top of it. Parked units block their tile; moving units only
/// surcharge their destination. The base matrix is never modified.
pub fn overlay_traffic(
    base: &CostMatrix,
    mover: &str,
    mover_pos: Position,
    traffic: &TrafficSnapshot,
    controller: Option<Position>,
    options: &OverlayOptions,
) -> CostMatrix {
    let mut matrix = base.clone();
    let room_name = mover_pos.room_name();

    let others: Vec<&UnitTraffic> = traffic
        .in_room(room_name)
        .filter(|u| u.name != mover && u.pos != mover_pos)
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect();

    for other in &others {
        if other.is_parked() {
            matrix.set_pos(other.pos, COST_MATRIX_BLOCKED);
            continue;
        }

        if let Some(destination) = other.destination {
            matrix.add_pos(destination, options.destination_cost);
        }
    }

    //
    // NOTE: Units working the controller should bunch up rather than spread
    //       out, so the zone surcharge is removed next to them.
    //
    if let Some(controller) = controller {
        let range = options.controller_range as u32;

        for other in others.iter().filter(|u| in_range(u.pos, controller, range)) {
            for pos in neighbours(other.pos).filter(|p| in_range(*p, controller, range)) {
                matrix.subtract_pos(pos, options.grouping_discount);
            }
        }
    }

    let own_cost = base.get_pos(mover_pos).min(COST_MATRIX_MAX_WALKABLE).max(1);

    matrix.set_pos(mover_pos, own_cost);

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: u8, y: u8) -> Position {
        make_position(x, y, RoomName::new("W1N1").unwrap()).unwrap()
    }

    fn flat() -> CostMatrix {
        CostMatrix::from_bits(vec![2; ROOM_AREA]).unwrap()
    }

    fn parked(name: &str, at: Position) -> UnitTraffic {
        UnitTraffic {
            name: name.to_string(),
            pos: at,
            path: None,
            destination: None,
            has_task: false,
        }
    }

    #[test]
    fn parked_units_block_their_tile() {
        let mut traffic = TrafficSnapshot::new();
        traffic.update(parked("other", pos(11, 10)));

        let matrix = overlay_traffic(&flat(), "me", pos(10, 10), &traffic, None, &OverlayOptions::default());

        assert_eq!(matrix.get(11, 10), COST_MATRIX_BLOCKED);
        assert_eq!(matrix.get(10, 10), 2);
    }

    #[test]
    fn moving_units_only_surcharge_their_destination() {
        let mut traffic = TrafficSnapshot::new();
        traffic.update(UnitTraffic {
            name: "other".to_string(),
            pos: pos(20, 20),
            path: Some("33".to_string()),
            destination: Some(pos(22, 20)),
            has_task: true,
        });

        let options = OverlayOptions::default();
        let matrix = overlay_traffic(&flat(), "me", pos(10, 10), &traffic, None, &options);

        assert_eq!(matrix.get(20, 20), 2);
        assert_eq!(matrix.get(21, 20), 2);
        assert_eq!(matrix.get(22, 20), 2 + options.destination_cost);
    }

    #[test]
    fn base_matrix_untouched() {
        let base = flat();
        let mut traffic = TrafficSnapshot::new();
        traffic.update(parked("other", pos(5, 5)));

        let _ = overlay_traffic(&base, "me", pos(10, 10), &traffic, None, &OverlayOptions::default());

        assert_eq!(base, flat());
    }

    #[test]
    fn grouping_discount_near_controller() {
        let controller = pos(25, 25);
        let mut base = flat();
        for p in positions_in_range(controller, 3) {
            base.add_pos(p, 2);
        }

        let mut traffic = TrafficSnapshot::new();
        traffic.update(UnitTraffic {
            name: "upgrader".to_string(),
            pos: pos(23, 25),
            path: None,
            destination: Some(pos(23, 25)),
            has_task: true,
        });

        let options = OverlayOptions {
            destination_cost: 0,
            ..OverlayOptions::default()
        };
        let matrix = overlay_traffic(&base, "me", pos(10, 10), &traffic, Some(controller), &options);

        // Next to the upgrader and inside the zone.
        assert_eq!(matrix.get(22, 25), 2);
        assert_eq!(matrix.get(24, 24), 2);

        // Inside the zone but away from the upgrader.
        assert_eq!(matrix.get(27, 25), 4);

        // Next to the upgrader but outside the zone.
        assert_eq!(matrix.get(21, 25), 2);
    }
}
