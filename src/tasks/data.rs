use super::actions::*;
use crate::constants::*;
use crate::world::*;
use log::*;
use screeps::Position;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVerb {
    Move,
    Harvest,
    Transfer,
    Withdraw,
    Pickup,
    Build,
    Repair,
    Upgrade,
    Attack,
}

impl ActionVerb {
    /// Range the unit must be within for the verb to act.
    pub fn range(self) -> u32 {
        match self {
            ActionVerb::Move => 0,
            ActionVerb::Build => BUILD_RANGE,
            ActionVerb::Repair => REPAIR_RANGE,
            ActionVerb::Upgrade => UPGRADE_RANGE,
            _ => ADJACENT_RANGE,
        }
    }

    pub fn action_flags(self) -> SimultaneousActionFlags {
        match self {
            ActionVerb::Move => SimultaneousActionFlags::MOVE,
            ActionVerb::Harvest => SimultaneousActionFlags::HARVEST,
            ActionVerb::Attack => SimultaneousActionFlags::ATTACK,
            ActionVerb::Build => SimultaneousActionFlags::BUILD,
            ActionVerb::Repair => SimultaneousActionFlags::REPAIR,
            ActionVerb::Transfer => SimultaneousActionFlags::TRANSFER,
            ActionVerb::Withdraw => SimultaneousActionFlags::WITHDRAW,
            ActionVerb::Pickup => SimultaneousActionFlags::PICKUP,
            ActionVerb::Upgrade => SimultaneousActionFlags::UPGRADE_CONTROLLER,
        }
    }

    /// Verbs that need a free tile next to the target.
    pub fn needs_adjacent_slot(self) -> bool {
        matches!(self, ActionVerb::Harvest | ActionVerb::Transfer | ActionVerb::Withdraw | ActionVerb::Pickup)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Clone, Debug, PartialEq)]
pub struct PositionTask {
    pub pos: Position,
    pub action: ActionVerb,
    pub completed: bool,
    pub persistent: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectTask {
    pub target_id: ObjectHandle,
    pub action: ActionVerb,
    pub completed: bool,
    pub persistent: bool,
}

/// A single action a unit is committed to: either a verb at a position or a
/// verb against a game object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord", into = "TaskRecord")]
pub enum Task {
    Position(PositionTask),
    Object(ObjectTask),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaskKind {
    Position,
    Object,
}

/// Stored shape of a task.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pos: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_id: Option<ObjectHandle>,
    action: ActionVerb,
    #[serde(default, skip_serializing_if = "is_false")]
    completed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    persistent: bool,
}

impl TryFrom<TaskRecord> for Task {
    type Error = String;

    fn try_from(record: TaskRecord) -> Result<Task, String> {
        match (record.kind, record.pos, record.target_id) {
            (TaskKind::Position, Some(pos), None) => Ok(Task::Position(PositionTask {
                pos,
                action: record.action,
                completed: record.completed,
                persistent: record.persistent,
            })),
            (TaskKind::Object, None, Some(target_id)) => Ok(Task::Object(ObjectTask {
                target_id,
                action: record.action,
                completed: record.completed,
                persistent: record.persistent,
            })),
            (kind, pos, target_id) => Err(format!(
                "{:?} task needs exactly one of pos/targetId (pos: {}, targetId: {})",
                kind,
                pos.is_some(),
                target_id.is_some()
            )),
        }
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> TaskRecord {
        match task {
            Task::Position(task) => TaskRecord {
                kind: TaskKind::Position,
                pos: Some(task.pos),
                target_id: None,
                action: task.action,
                completed: task.completed,
                persistent: task.persistent,
            },
            Task::Object(task) => TaskRecord {
                kind: TaskKind::Object,
                pos: None,
                target_id: Some(task.target_id),
                action: task.action,
                completed: task.completed,
                persistent: task.persistent,
            },
        }
    }
}

impl Task {
    pub fn at_position(pos: Position, action: ActionVerb) -> Task {
        Task::Position(PositionTask {
            pos,
            action,
            completed: false,
            persistent: false,
        })
    }

    pub fn on_object(target_id: ObjectHandle, action: ActionVerb) -> Task {
        Task::Object(ObjectTask {
            target_id,
            action,
            completed: false,
            persistent: false,
        })
    }

    pub fn with_persistent(mut self, persistent: bool) -> Task {
        match &mut self {
            Task::Position(task) => task.persistent = persistent,
            Task::Object(task) => task.persistent = persistent,
        }

        self
    }

    pub fn action(&self) -> ActionVerb {
        match self {
            Task::Position(task) => task.action,
            Task::Object(task) => task.action,
        }
    }

    pub fn target_id(&self) -> Option<&ObjectHandle> {
        match self {
            Task::Object(task) => Some(&task.target_id),
            Task::Position(_) => None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Task::Position(task) => Some(task.pos),
            Task::Object(_) => None,
        }
    }

    /// Range the unit has to close to before the task can act.
    pub fn range(&self) -> u32 {
        match self {
            Task::Position(task) => task.action.range(),
            Task::Object(task) if task.action == ActionVerb::Move => ADJACENT_RANGE,
            Task::Object(task) => task.action.range(),
        }
    }

    pub fn is_completed(&self) -> bool {
        match self {
            Task::Position(task) => task.completed,
            Task::Object(task) => task.completed,
        }
    }

    pub fn set_completed(&mut self, completed: bool) {
        match self {
            Task::Position(task) => task.completed = completed,
            Task::Object(task) => task.completed = completed,
        }
    }

    pub fn is_persistent(&self) -> bool {
        match self {
            Task::Position(task) => task.persistent,
            Task::Object(task) => task.persistent,
        }
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        match self {
            Task::Position(task) => task.persistent = persistent,
            Task::Object(task) => task.persistent = persistent,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Task::Position(task) => format!("{:?} at {}", task.action, task.pos),
            Task::Object(task) => format!("{:?} on {}", task.action, task.target_id),
        }
    }
}

/// Result reported by an action handler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ActionResult {
    pub code: ActionCode,
    pub persistent: bool,
    pub spent: SimultaneousActionFlags,
}

impl ActionResult {
    /// Finished; the task can be dropped.
    pub fn done() -> ActionResult {
        ActionResult {
            code: ActionCode::Ok,
            persistent: false,
            spent: SimultaneousActionFlags::UNSET,
        }
    }

    pub fn acted(spent: SimultaneousActionFlags, persistent: bool) -> ActionResult {
        ActionResult {
            code: ActionCode::Ok,
            persistent,
            spent,
        }
    }

    /// Try again next tick.
    pub fn deferred(code: ActionCode) -> ActionResult {
        ActionResult {
            code,
            persistent: true,
            spent: SimultaneousActionFlags::UNSET,
        }
    }

    pub fn not_in_range() -> ActionResult {
        ActionResult::deferred(ActionCode::NotInRange)
    }

    pub fn busy() -> ActionResult {
        ActionResult::deferred(ActionCode::Busy)
    }

    /// A task leaves the queue only on unconditional success.
    pub fn removes_task(&self) -> bool {
        self.code == ActionCode::Ok && !self.persistent
    }
}

/// Ordered tasks of one unit. Order is execution priority.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskQueue {
    tasks: Vec<Task>,
}

impl TaskQueue {
    pub fn new() -> TaskQueue {
        TaskQueue::default()
    }

    /// Parses stored task values, dropping (and logging) malformed entries.
    pub fn from_values(unit_name: &str, values: Vec<Value>) -> TaskQueue {
        let tasks = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Task>(value) {
                Ok(task) => Some(task),
                Err(err) => {
                    warn!("Dropping malformed task for {}: {}", unit_name, err);

                    None
                }
            })
            .collect();

        TaskQueue { tasks }
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.tasks.iter().filter_map(|task| serde_json::to_value(task).ok()).collect())
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn first_pending(&self) -> Option<usize> {
        self.tasks.iter().position(|task| !task.is_completed())
    }

    /// Applies a handler result to the task at `index`. Returns true if the
    /// task was removed.
    pub fn apply_result(&mut self, index: usize, result: &ActionResult) -> bool {
        if index >= self.tasks.len() {
            return false;
        }

        if result.removes_task() {
            self.tasks.remove(index);

            true
        } else {
            self.tasks[index].set_completed(true);

            false
        }
    }

    pub fn reset_completed(&mut self) {
        for task in self.tasks.iter_mut() {
            task.set_completed(false);
        }
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::*;
    use screeps::RoomName;
    use serde_json::json;

    fn pos(x: u8, y: u8) -> Position {
        make_position(x, y, RoomName::new("W1N1").unwrap()).unwrap()
    }

    #[test]
    fn object_task_wire_shape() {
        let task = Task::on_object(ObjectHandle::new("abc"), ActionVerb::Harvest).with_persistent(true);

        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value, json!({ "kind": "object", "targetId": "abc", "action": "harvest", "persistent": true }));
        assert_eq!(serde_json::from_value::<Task>(value).unwrap(), task);
    }

    #[test]
    fn position_task_round_trip() {
        let task = Task::at_position(pos(10, 12), ActionVerb::Move);

        let restored: Task = serde_json::from_value(serde_json::to_value(&task).unwrap()).unwrap();

        assert_eq!(restored, task);
        assert_eq!(restored.position(), Some(pos(10, 12)));
        assert!(restored.target_id().is_none());
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let values = vec![
            json!({ "kind": "object", "targetId": "abc", "action": "build" }),
            json!({ "kind": "object", "action": "build" }),
            json!({ "kind": "teleport" }),
            json!({ "kind": "position", "targetId": "abc", "action": "move" }),
            json!(17),
        ];

        let queue = TaskQueue::from_values("worker", values);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(0).map(|t| t.action()), Some(ActionVerb::Build));
    }

    #[test]
    fn removal_requires_ok_and_not_persistent() {
        let codes = [
            ActionCode::Ok,
            ActionCode::NotInRange,
            ActionCode::Tired,
            ActionCode::Busy,
            ActionCode::InvalidTarget,
        ];

        for code in codes {
            for persistent in [false, true] {
                let mut queue = TaskQueue::new();
                queue.push(Task::on_object(ObjectHandle::new("t"), ActionVerb::Build));

                let result = ActionResult {
                    code,
                    persistent,
                    spent: SimultaneousActionFlags::UNSET,
                };

                let removed = queue.apply_result(0, &result);

                assert_eq!(removed, code == ActionCode::Ok && !persistent);
                assert_eq!(queue.is_empty(), removed);
            }
        }
    }

    #[test]
    fn completed_is_transient() {
        let mut queue = TaskQueue::new();
        queue.push(Task::on_object(ObjectHandle::new("t"), ActionVerb::Upgrade));

        queue.apply_result(0, &ActionResult::not_in_range());
        assert_eq!(queue.first_pending(), None);

        queue.reset_completed();
        assert_eq!(queue.first_pending(), Some(0));
        assert!(queue.to_value()[0].get("completed").is_none());
    }
}
