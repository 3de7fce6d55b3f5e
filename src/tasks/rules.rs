use super::data::*;
use screeps::Part;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    #[default]
    ByRange,
    ByPath,
}

/// Kinds of room objects a rule can look for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Energy sources that still have energy.
    Source,
    /// Own spawns and extensions with free capacity.
    SpawnEnergy,
    /// Own towers with free capacity.
    Tower,
    /// Storage and containers with free capacity.
    Storage,
    /// Storage and containers holding energy.
    EnergyStore,
    DroppedEnergy,
    ConstructionSite,
    /// Own structures, roads and containers below their repair threshold.
    DamagedStructure,
    Hostile,
}

/// How a rule picks its target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSelector {
    /// Closest candidate of a kind that is not already over-assigned.
    Closest {
        kind: TargetKind,
        #[serde(default)]
        by: Proximity,
    },
    /// The room's controller, if owned.
    Controller,
    /// A fixed position in the unit's room.
    Position { x: u8, y: u8 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    FreeCapacityAbove(u32),
    UsedCapacityAbove(u32),
    IsEmpty,
    IsFull,
    HasPart(Part),
    HostilesPresent,
    ConstructionSitesPresent,
    ControllerLevelBelow(u8),
    /// The candidate target can take another unit for the rule's verb.
    TargetNotOverAssigned,
    TargetHasFreeCapacity,
    TargetHasEnergy,
    TargetWithinRange(u32),
    Not(Box<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Predicates that inspect the candidate target rather than the unit or room.
    pub fn needs_target(&self) -> bool {
        match self {
            Predicate::TargetNotOverAssigned
            | Predicate::TargetHasFreeCapacity
            | Predicate::TargetHasEnergy
            | Predicate::TargetWithinRange(_) => true,
            Predicate::Not(inner) => inner.needs_target(),
            Predicate::Any(inner) => inner.iter().any(|p| p.needs_target()),
            _ => false,
        }
    }
}

/// One row of a role's decision table: when `condition` holds, find a target
/// with `target`, check it with `validate`, and commit to `action` on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRule {
    #[serde(default)]
    pub condition: Vec<Predicate>,
    pub target: TargetSelector,
    pub action: ActionVerb,
    #[serde(default)]
    pub validate: Vec<Predicate>,
    #[serde(default)]
    pub persistent: bool,
}

impl TaskRule {
    pub fn new(target: TargetSelector, action: ActionVerb) -> TaskRule {
        TaskRule {
            condition: Vec::new(),
            target,
            action,
            validate: Vec::new(),
            persistent: false,
        }
    }

    pub fn when(mut self, predicate: Predicate) -> TaskRule {
        self.condition.push(predicate);
        self
    }

    pub fn validate(mut self, predicate: Predicate) -> TaskRule {
        self.validate.push(predicate);
        self
    }

    pub fn closest(kind: TargetKind) -> TargetSelector {
        TargetSelector::Closest {
            kind,
            by: Proximity::ByRange,
        }
    }

    pub fn closest_by_path(kind: TargetKind) -> TargetSelector {
        TargetSelector::Closest { kind, by: Proximity::ByPath }
    }
}
