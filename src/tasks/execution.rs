use super::actions::*;
use super::data::*;
use super::handlers;
use crate::pathing::*;
use crate::unit::*;
use crate::world::*;
use log::*;

/// What happened during one unit's turn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionOutcome {
    pub executed: u32,
    pub removed: u32,
    pub spent: SimultaneousActionFlags,
    pub movement: Option<MovementResult>,
    /// The queue was cleared because the unit could not reach its target.
    pub abandoned: bool,
}

pub struct TaskExecutionEngine;

impl TaskExecutionEngine {
    /// Drains the unit's queue for this tick. Tasks run in queue order until
    /// one needs the unit to move, which ends the turn after a single step.
    pub fn execute<G>(game: &mut G, unit: &mut UnitController, traveler: &mut Traveler) -> ExecutionOutcome
    where
        G: Game + ?Sized,
    {
        let mut outcome = ExecutionOutcome::default();
        let mut flags = SimultaneousActionFlags::UNSET;

        unit.tasks.reset_completed();

        while let Some(index) = unit.tasks.first_pending() {
            let Some(task) = unit.tasks.get(index).cloned() else {
                break;
            };

            let result = handlers::dispatch(game, &unit.info, &task, &mut flags);

            outcome.executed += 1;
            outcome.spent |= result.spent;

            trace!("{}: {} -> {:?}", unit.info.name, task.describe(), result);

            if unit.tasks.apply_result(index, &result) {
                outcome.removed += 1;
            }

            if result.spent != SimultaneousActionFlags::UNSET {
                if let Some(info) = game.unit(&unit.info.name) {
                    unit.info = info;
                }
            }

            if result.code == ActionCode::NotInRange {
                if flags.consume(SimultaneousActionFlags::MOVE) {
                    outcome.movement = Self::move_toward(game, unit, &task, traveler);
                    outcome.spent |= SimultaneousActionFlags::MOVE;

                    if let Some(MovementResult::Failed(MovementFailure::StuckTimeout { ticks })) = outcome.movement {
                        info!("{}: stuck for {} ticks, abandoning {} queued tasks", unit.info.name, ticks, unit.tasks.len());

                        unit.tasks.clear();
                        outcome.abandoned = true;
                    }
                }

                break;
            }
        }

        unit.tasks.reset_completed();

        if unit.tasks.is_empty() {
            unit.travel = None;
        }

        outcome
    }

    fn move_toward<G>(game: &mut G, unit: &mut UnitController, task: &Task, traveler: &mut Traveler) -> Option<MovementResult>
    where
        G: Game + ?Sized,
    {
        let target = match task {
            Task::Position(task) => task.pos,
            Task::Object(task) => game.get_object(&task.target_id)?.pos(),
        };

        Some(traveler.travel_to(game, &unit.info, &mut unit.travel, target, task.range()))
    }
}
