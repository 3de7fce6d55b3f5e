use super::context::*;
use super::data::*;
use super::rules::*;
use log::*;

/// Picks a new task for an idle unit from its role's ordered rules. The first
/// rule whose condition holds, whose selector finds a target and whose
/// validation accepts that target wins.
pub struct TaskAssignmentEngine<'r> {
    rules: &'r [TaskRule],
}

impl<'r> TaskAssignmentEngine<'r> {
    pub fn new(rules: &'r [TaskRule]) -> TaskAssignmentEngine<'r> {
        TaskAssignmentEngine { rules }
    }

    pub fn assign(&self, context: &mut AssignmentContext) -> Option<Task> {
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.condition.iter().all(|p| context.check(p, None, rule.action)) {
                continue;
            }

            let Some(target) = context.resolve(&rule.target, rule.action) else {
                trace!("{} rule {} found no target", context.unit.name, index);
                continue;
            };

            if !rule.validate.iter().all(|p| context.check(p, Some(&target), rule.action)) {
                trace!("{} rule {} rejected target at {}", context.unit.name, index, target.pos());
                continue;
            }

            let task = target.into_task(rule.action, rule.persistent);

            debug!("{} assigned {} (rule {})", context.unit.name, task.describe(), index);

            return Some(task);
        }

        None
    }
}
