use crate::memory::*;
use crate::pathing::*;
use crate::tasks::data::*;
use crate::world::*;
use log::*;
use serde_json::Value;

pub const ROLE_KEY: &str = "role";
pub const TASK_KEY: &str = "task";

/// A live unit together with its persisted role, task queue and travel
/// state. Loaded at the start of the unit's turn and saved at the end.
#[derive(Clone, Debug)]
pub struct UnitController {
    pub info: UnitInfo,
    pub role: Option<String>,
    pub tasks: TaskQueue,
    pub travel: Option<TravelState>,
}

impl UnitController {
    pub fn load(info: UnitInfo, memory: &dyn MemoryStore) -> UnitController {
        let name = info.name.clone();

        let role = memory.get(&unit_path(&name, ROLE_KEY)).and_then(|v| v.as_str().map(|s| s.to_owned()));

        let tasks = match memory.get(&unit_path(&name, TASK_KEY)) {
            Some(Value::Array(values)) => TaskQueue::from_values(&name, values),
            Some(Value::Null) | None => TaskQueue::new(),
            Some(value @ Value::Object(_)) => TaskQueue::from_values(&name, vec![value]),
            Some(other) => {
                warn!("Dropping unreadable task queue for {}: {}", name, other);

                TaskQueue::new()
            }
        };

        let travel = match get_typed::<TravelState>(memory, &unit_path(&name, TRAVEL_STATE_KEY)) {
            Ok(travel) => travel,
            Err(err) => {
                warn!("Dropping unreadable travel state for {}: {}", name, err);

                None
            }
        };

        UnitController { info, role, tasks, travel }
    }

    pub fn save(&self, memory: &mut dyn MemoryStore) -> Result<(), String> {
        let name = &self.info.name;

        if self.tasks.is_empty() {
            memory.delete(&unit_path(name, TASK_KEY));
        } else {
            memory.set(&unit_path(name, TASK_KEY), self.tasks.to_value());
        }

        match &self.travel {
            Some(travel) => set_typed(memory, &unit_path(name, TRAVEL_STATE_KEY), travel)?,
            None => memory.delete(&unit_path(name, TRAVEL_STATE_KEY)),
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn traffic(&self) -> UnitTraffic {
        UnitTraffic {
            name: self.info.name.clone(),
            pos: self.info.pos,
            path: self.travel.as_ref().map(|t| t.path.clone()),
            destination: self.travel.as_ref().map(|t| t.destination),
            has_task: !self.tasks.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::*;
    use screeps::RoomName;
    use serde_json::json;

    fn info(name: &str) -> UnitInfo {
        UnitInfo {
            name: name.to_string(),
            id: ObjectHandle::new(format!("id-{}", name)),
            pos: make_position(10, 10, RoomName::new("W1N1").unwrap()).unwrap(),
            fatigue: 0,
            body: Vec::new(),
            store: Store::new(0, 50),
            my: true,
            spawning: false,
        }
    }

    #[test]
    fn single_task_object_is_accepted() {
        let mut memory = JsonMemory::new();
        memory.set("creeps.a.role", json!("harvester"));
        memory.set("creeps.a.task", json!({ "kind": "object", "targetId": "src", "action": "harvest" }));

        let unit = UnitController::load(info("a"), &memory);

        assert_eq!(unit.role.as_deref(), Some("harvester"));
        assert_eq!(unit.tasks.len(), 1);
    }

    #[test]
    fn save_round_trips_and_clears() {
        let mut memory = JsonMemory::new();

        let mut unit = UnitController::load(info("b"), &memory);
        unit.tasks.push(Task::on_object(ObjectHandle::new("site"), ActionVerb::Build));
        unit.travel = Some(TravelState::new(unit.info.pos, unit.info.pos, 3));
        unit.save(&mut memory).unwrap();

        let reloaded = UnitController::load(info("b"), &memory);
        assert_eq!(reloaded.tasks, unit.tasks);
        assert_eq!(reloaded.travel, unit.travel);

        unit.tasks.clear();
        unit.travel = None;
        unit.save(&mut memory).unwrap();

        assert!(memory.get("creeps.b.task").is_none());
        assert!(memory.get("creeps.b.travelState").is_none());
    }

    #[test]
    fn corrupt_travel_state_is_dropped() {
        let mut memory = JsonMemory::new();
        memory.set("creeps.c.travelState", json!({ "stuckCounter": "many" }));

        let unit = UnitController::load(info("c"), &memory);

        assert!(unit.travel.is_none());
    }
}
