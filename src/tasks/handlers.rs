use super::actions::*;
use super::data::*;
use crate::constants::*;
use crate::location::*;
use crate::world::*;
use log::*;
use screeps::Part;

/// Runs the handler for a task's verb. Every handler reports through the
/// same outcome contract:
///
/// - target of the wrong type, target vanished, nothing left to do or an
///   unrecoverable error: `Ok` without `persistent`, so the task is dropped.
/// - out of range: `NotInRange`, persistent, so the caller moves the unit.
/// - capability already spent this tick: `Busy`, persistent.
/// - acted: `Ok`, persistent while there is more work for the next tick.
pub fn dispatch<G>(game: &mut G, unit: &UnitInfo, task: &Task, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let target = match task {
        Task::Position(task) => return run_position(unit, task),
        Task::Object(task) => match game.get_object(&task.target_id) {
            Some(target) => target,
            None => {
                debug!("{}: target {} of {:?} is gone", unit.name, task.target_id, task.action);

                return ActionResult::done();
            }
        },
    };

    match task.action() {
        ActionVerb::Move => run_move_to_object(unit, &target),
        ActionVerb::Harvest => harvest(game, unit, &target, flags),
        ActionVerb::Transfer => transfer(game, unit, &target, flags),
        ActionVerb::Withdraw => withdraw(game, unit, &target, flags),
        ActionVerb::Pickup => pickup(game, unit, &target, flags),
        ActionVerb::Build => build(game, unit, &target, flags),
        ActionVerb::Repair => repair(game, unit, &target, flags),
        ActionVerb::Upgrade => upgrade(game, unit, &target, flags),
        ActionVerb::Attack => attack(game, unit, &target, flags),
    }
}

fn run_position(unit: &UnitInfo, task: &PositionTask) -> ActionResult {
    if task.action != ActionVerb::Move {
        warn!("{}: {:?} is not supported on a position, dropping task", unit.name, task.action);

        return ActionResult::done();
    }

    if unit.pos == task.pos {
        ActionResult::done()
    } else {
        ActionResult::not_in_range()
    }
}

fn run_move_to_object(unit: &UnitInfo, target: &RoomObject) -> ActionResult {
    if in_range(unit.pos, target.pos(), ADJACENT_RANGE) {
        ActionResult::done()
    } else {
        ActionResult::not_in_range()
    }
}

/// Spends `flag` and issues the verb. `on_ok` decides whether the task
/// stays for another tick after a successful action.
fn perform<G, F>(
    game: &mut G,
    unit: &UnitInfo,
    verb: ActionVerb,
    target: &RoomObject,
    flags: &mut SimultaneousActionFlags,
    on_ok: F,
) -> ActionResult
where
    G: Game + ?Sized,
    F: FnOnce() -> bool,
{
    if !in_range(unit.pos, target.pos(), verb.range()) {
        return ActionResult::not_in_range();
    }

    let flag = verb.action_flags();

    if !flags.consume(flag) {
        return ActionResult::busy();
    }

    match game.act(&unit.name, verb, target.id()) {
        ActionCode::Ok => ActionResult::acted(flag, on_ok()),
        code if code.is_transient() => {
            flags.refund(flag);

            ActionResult::deferred(code)
        }
        code => {
            flags.refund(flag);

            info!("{}: {:?} on {} failed with {:?}, dropping task", unit.name, verb, target.id(), code);

            ActionResult::done()
        }
    }
}

fn harvest<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let RoomObject::Source(source) = target else {
        return ActionResult::done();
    };

    if unit.store.capacity > 0 && unit.store.is_full() {
        return ActionResult::done();
    }

    if source.energy == 0 {
        return ActionResult::done();
    }

    let harvested = (unit.count_parts(Part::Work) * HARVEST_POWER).min(source.energy);
    let free = unit.store.free();
    let drop_mining = unit.store.capacity == 0;

    perform(game, unit, ActionVerb::Harvest, target, flags, || drop_mining || harvested < free)
}

fn transfer<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let accepts = match target {
        RoomObject::Structure(structure) => structure.accepts_energy(),
        RoomObject::Unit(other) => other.my && other.store.free() > 0,
        _ => false,
    };

    if !accepts || unit.store.is_empty() {
        return ActionResult::done();
    }

    perform(game, unit, ActionVerb::Transfer, target, flags, || false)
}

fn withdraw<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let has_energy = match target {
        RoomObject::Structure(structure) => structure.store.map(|s| s.used > 0).unwrap_or(false),
        _ => false,
    };

    if !has_energy || unit.store.is_full() {
        return ActionResult::done();
    }

    perform(game, unit, ActionVerb::Withdraw, target, flags, || false)
}

fn pickup<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let RoomObject::DroppedResource(resource) = target else {
        return ActionResult::done();
    };

    if resource.amount == 0 || unit.store.is_full() {
        return ActionResult::done();
    }

    perform(game, unit, ActionVerb::Pickup, target, flags, || false)
}

fn build<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let RoomObject::ConstructionSite(site) = target else {
        return ActionResult::done();
    };

    if unit.store.is_empty() {
        return ActionResult::done();
    }

    let spent = unit.count_parts(Part::Work) * BUILD_POWER;
    let remaining = site.progress_total.saturating_sub(site.progress);
    let energy = unit.store.used;

    perform(game, unit, ActionVerb::Build, target, flags, || energy > spent && remaining > spent)
}

fn repair<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let RoomObject::Structure(structure) = target else {
        return ActionResult::done();
    };

    if unit.store.is_empty() || structure.hits >= structure.hits_max {
        return ActionResult::done();
    }

    let work = unit.count_parts(Part::Work);
    let missing = structure.hits_max - structure.hits;
    let energy = unit.store.used;

    perform(game, unit, ActionVerb::Repair, target, flags, || energy > work && missing > work * REPAIR_POWER)
}

fn upgrade<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    let RoomObject::Controller(controller) = target else {
        return ActionResult::done();
    };

    if !controller.my || unit.store.is_empty() {
        return ActionResult::done();
    }

    let spent = unit.count_parts(Part::Work) * UPGRADE_CONTROLLER_POWER;
    let energy = unit.store.used;

    perform(game, unit, ActionVerb::Upgrade, target, flags, || energy > spent)
}

fn attack<G>(game: &mut G, unit: &UnitInfo, target: &RoomObject, flags: &mut SimultaneousActionFlags) -> ActionResult
where
    G: Game + ?Sized,
{
    match target {
        RoomObject::Unit(other) if !other.my => perform(game, unit, ActionVerb::Attack, target, flags, || true),
        RoomObject::Structure(structure) if !structure.my => perform(game, unit, ActionVerb::Attack, target, flags, || true),
        _ => ActionResult::done(),
    }
}
