use super::capacity::*;
use super::data::*;
use super::rules::*;
use crate::findnearest::*;
use crate::location::*;
use crate::pathing::*;
use crate::room::snapshot::*;
use crate::world::*;
use screeps::{Position, RoomName, StructureType};
use std::collections::HashMap;

/// Share of max hits below which a structure counts as damaged.
const REPAIR_THRESHOLD_PERCENT: u32 = 75;

/// A resolved rule target.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedTarget {
    Object(RoomObject),
    Position(Position),
}

impl ResolvedTarget {
    pub fn pos(&self) -> Position {
        match self {
            ResolvedTarget::Object(object) => object.pos(),
            ResolvedTarget::Position(pos) => *pos,
        }
    }

    pub fn into_task(self, action: ActionVerb, persistent: bool) -> Task {
        match self {
            ResolvedTarget::Object(object) => Task::on_object(object.id().clone(), action),
            ResolvedTarget::Position(pos) => Task::at_position(pos, action),
        }
        .with_persistent(persistent)
    }
}

/// Path search used for `Proximity::ByPath` lookups.
pub struct PathLengthSource<'a> {
    pub pathfinder: &'a mut dyn PathfindingProvider,
    pub matrix: &'a CostMatrix,
    pub max_ops: u32,
}

impl<'a> PathLengthSource<'a> {
    fn path_length(&mut self, from: Position, to: Position, range: u32) -> Option<u32> {
        let matrix = self.matrix.clone();
        let room_name = from.room_name();

        let mut callback = move |requested: RoomName| if requested == room_name { Some(matrix.clone()) } else { None };

        let result = self.pathfinder.search(from, to, range, &mut callback, self.max_ops, 1);

        if result.incomplete {
            None
        } else {
            Some(result.path.len() as u32)
        }
    }
}

/// Everything a rule evaluation for one unit can look at. Closest-target
/// lookups are memoized for the duration of the evaluation pass.
pub struct AssignmentContext<'a> {
    pub unit: &'a UnitInfo,
    pub snapshot: &'a RoomSnapshot,
    pub ledger: &'a AssignmentLedger,
    paths: Option<PathLengthSource<'a>>,
    closest: HashMap<(TargetKind, Proximity, ActionVerb), Option<RoomObject>>,
}

impl<'a> AssignmentContext<'a> {
    pub fn new(unit: &'a UnitInfo, snapshot: &'a RoomSnapshot, ledger: &'a AssignmentLedger) -> AssignmentContext<'a> {
        AssignmentContext {
            unit,
            snapshot,
            ledger,
            paths: None,
            closest: HashMap::new(),
        }
    }

    pub fn with_paths(mut self, paths: PathLengthSource<'a>) -> AssignmentContext<'a> {
        self.paths = Some(paths);
        self
    }

    pub fn resolve(&mut self, selector: &TargetSelector, verb: ActionVerb) -> Option<ResolvedTarget> {
        match selector {
            TargetSelector::Closest { kind, by } => self.closest(*kind, *by, verb).map(ResolvedTarget::Object),
            TargetSelector::Controller => self
                .snapshot
                .controller
                .as_ref()
                .filter(|c| c.my)
                .map(|c| ResolvedTarget::Object(RoomObject::Controller(c.clone()))),
            TargetSelector::Position { x, y } => make_position(*x, *y, self.snapshot.room_name).map(ResolvedTarget::Position),
        }
    }

    fn closest(&mut self, kind: TargetKind, by: Proximity, verb: ActionVerb) -> Option<RoomObject> {
        let key = (kind, by, verb);

        if let Some(cached) = self.closest.get(&key) {
            return cached.clone();
        }

        let candidates: Vec<RoomObject> = self
            .candidates(kind)
            .into_iter()
            .filter(|c| !is_over_assigned(self.ledger, self.snapshot, self.unit, c, verb))
            .collect();

        let start = self.unit.pos;
        let range = verb.range();

        let nearest = match (by, self.paths.as_mut()) {
            (Proximity::ByPath, Some(paths)) => candidates
                .into_iter()
                .find_nearest_from(start, |from, c| paths.path_length(from, c.pos(), range)),
            _ => candidates.into_iter().find_nearest_linear_by(start, |c| c.pos()),
        };

        self.closest.insert(key, nearest.clone());

        nearest
    }

    fn candidates(&self, kind: TargetKind) -> Vec<RoomObject> {
        let snapshot = self.snapshot;

        let structures = |filter: fn(&StructureInfo) -> bool| -> Vec<RoomObject> {
            snapshot
                .structures
                .iter()
                .filter(|s| filter(s))
                .map(|s| RoomObject::Structure(s.clone()))
                .collect()
        };

        match kind {
            TargetKind::Source => snapshot
                .sources
                .iter()
                .filter(|s| s.energy > 0)
                .map(|s| RoomObject::Source(s.clone()))
                .collect(),
            TargetKind::SpawnEnergy => structures(|s| {
                s.my && matches!(s.structure_type, StructureType::Spawn | StructureType::Extension) && s.accepts_energy()
            }),
            TargetKind::Tower => structures(|s| s.my && s.structure_type == StructureType::Tower && s.accepts_energy()),
            TargetKind::Storage => structures(|s| is_energy_store(s) && s.accepts_energy()),
            TargetKind::EnergyStore => structures(|s| is_energy_store(s) && s.store.map(|st| st.used > 0).unwrap_or(false)),
            TargetKind::DroppedEnergy => snapshot
                .dropped_resources
                .iter()
                .filter(|r| r.amount > 0)
                .map(|r| RoomObject::DroppedResource(r.clone()))
                .collect(),
            TargetKind::ConstructionSite => snapshot
                .construction_sites
                .iter()
                .filter(|s| s.my)
                .map(|s| RoomObject::ConstructionSite(s.clone()))
                .collect(),
            TargetKind::DamagedStructure => structures(|s| {
                let owned = s.my || matches!(s.structure_type, StructureType::Road | StructureType::Container);

                owned && s.hits_max > 0 && s.hits * 100 < s.hits_max * REPAIR_THRESHOLD_PERCENT
            }),
            TargetKind::Hostile => snapshot.hostiles().map(|u| RoomObject::Unit(u.clone())).collect(),
        }
    }

    /// Evaluates a predicate. Target predicates are false without a target.
    pub fn check(&self, predicate: &Predicate, target: Option<&ResolvedTarget>, verb: ActionVerb) -> bool {
        let unit = self.unit;

        let target_object = match target {
            Some(ResolvedTarget::Object(object)) => Some(object),
            _ => None,
        };

        match predicate {
            Predicate::FreeCapacityAbove(amount) => unit.store.free() > *amount,
            Predicate::UsedCapacityAbove(amount) => unit.store.used > *amount,
            Predicate::IsEmpty => unit.store.is_empty(),
            Predicate::IsFull => unit.store.is_full(),
            Predicate::HasPart(part) => unit.has_part(*part),
            Predicate::HostilesPresent => self.snapshot.hostiles().next().is_some(),
            Predicate::ConstructionSitesPresent => self.snapshot.construction_sites.iter().any(|s| s.my),
            Predicate::ControllerLevelBelow(level) => self.snapshot.controller.as_ref().map(|c| c.level < *level).unwrap_or(false),
            Predicate::TargetNotOverAssigned => match target {
                Some(ResolvedTarget::Object(object)) => !is_over_assigned(self.ledger, self.snapshot, unit, object, verb),
                Some(ResolvedTarget::Position(_)) => true,
                None => false,
            },
            Predicate::TargetHasFreeCapacity => target_object.and_then(|o| o.store()).map(|s| s.free() > 0).unwrap_or(false),
            Predicate::TargetHasEnergy => match target_object {
                Some(RoomObject::Source(source)) => source.energy > 0,
                Some(RoomObject::DroppedResource(resource)) => resource.amount > 0,
                Some(other) => other.store().map(|s| s.used > 0).unwrap_or(false),
                None => false,
            },
            Predicate::TargetWithinRange(range) => target.map(|t| in_range(unit.pos, t.pos(), *range)).unwrap_or(false),
            Predicate::Not(inner) => !self.check(inner, target, verb),
            Predicate::Any(inner) => inner.iter().any(|p| self.check(p, target, verb)),
        }
    }
}

fn is_energy_store(structure: &StructureInfo) -> bool {
    match structure.structure_type {
        StructureType::Storage => structure.my,
        StructureType::Container => true,
        _ => false,
    }
}
