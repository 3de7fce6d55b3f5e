use super::data::*;
use crate::location::*;
use crate::room::snapshot::*;
use crate::world::*;
use itertools::*;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
struct Commitment {
    unit: String,
    verb: ActionVerb,
    distance: u32,
    amount: u32,
}

/// Which units are committed to which targets this tick, and how much energy
/// they are bringing or taking. Kept current as units are assigned so that
/// later units see earlier commitments.
#[derive(Clone, Debug, Default)]
pub struct AssignmentLedger {
    commitments: HashMap<ObjectHandle, Vec<Commitment>>,
}

impl AssignmentLedger {
    pub fn new() -> AssignmentLedger {
        AssignmentLedger::default()
    }

    /// Records every object task in `tasks` as a commitment of `unit`.
    /// Replaces any earlier commitments of the same unit.
    pub fn register(&mut self, unit: &UnitInfo, tasks: &TaskQueue, snapshot: &RoomSnapshot) {
        self.release(&unit.name);

        for task in tasks.iter() {
            let Some(target_id) = task.target_id() else {
                continue;
            };

            let verb = task.action();

            let distance = snapshot.find(target_id).map(|t| range_between(unit.pos, t.pos())).unwrap_or(u32::MAX);

            let amount = match verb {
                ActionVerb::Transfer => unit.store.used,
                ActionVerb::Withdraw | ActionVerb::Pickup => unit.store.free(),
                _ => 0,
            };

            self.commitments.entry(target_id.clone()).or_default().push(Commitment {
                unit: unit.name.clone(),
                verb,
                distance,
                amount,
            });
        }
    }

    pub fn release(&mut self, unit_name: &str) {
        for commitments in self.commitments.values_mut() {
            commitments.retain(|c| c.unit != unit_name);
        }

        self.commitments.retain(|_, c| !c.is_empty());
    }

    /// Units other than `excluding` holding one of the tiles next to
    /// `target`, whatever they are doing there.
    pub fn slot_holders(&self, target: &ObjectHandle, excluding: &str) -> u32 {
        self.commitments
            .get(target)
            .map(|c| {
                c.iter()
                    .filter(|c| c.verb.needs_adjacent_slot() && c.unit != excluding)
                    .map(|c| c.unit.as_str())
                    .unique()
                    .count() as u32
            })
            .unwrap_or(0)
    }

    /// Energy already promised to or from `target` by units at most
    /// `within` tiles away.
    pub fn promised_amount(&self, target: &ObjectHandle, verb: ActionVerb, within: u32, excluding: &str) -> u32 {
        self.commitments
            .get(target)
            .map(|c| {
                c.iter()
                    .filter(|c| c.verb == verb && c.unit != excluding && c.distance <= within)
                    .map(|c| c.amount)
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }
}

/// True if `unit` committing to `verb` on `target` would exceed what the
/// target can serve: its free adjacent tiles, or for energy moves the
/// capacity not already promised to closer units.
pub fn is_over_assigned(ledger: &AssignmentLedger, snapshot: &RoomSnapshot, unit: &UnitInfo, target: &RoomObject, verb: ActionVerb) -> bool {
    let target_id = target.id();

    if verb.needs_adjacent_slot() {
        let slots = snapshot.walkable_adjacent(target.pos());
        let committed = ledger.slot_holders(target_id, &unit.name);

        if committed >= slots {
            return true;
        }
    }

    let distance = range_between(unit.pos, target.pos());

    match verb {
        ActionVerb::Transfer => {
            let free = target.store().map(|s| s.free()).unwrap_or(0);
            let promised = ledger.promised_amount(target_id, verb, distance, &unit.name);

            free <= promised
        }
        ActionVerb::Withdraw | ActionVerb::Pickup => {
            let available = match target {
                RoomObject::DroppedResource(resource) => resource.amount,
                other => other.store().map(|s| s.used).unwrap_or(0),
            };
            let promised = ledger.promised_amount(target_id, verb, distance, &unit.name);

            available <= promised
        }
        _ => false,
    }
}
