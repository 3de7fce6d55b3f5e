use log::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub const UNITS_KEY: &str = "creeps";
pub const ROOMS_KEY: &str = "rooms";
pub const CONFIG_KEY: &str = "_config";
pub const FEATURES_KEY: &str = "_features";

/// Cross-tick key-value store. Paths are dot separated (`creeps.worker-1.task`).
pub trait MemoryStore {
    fn get(&self, path: &str) -> Option<Value>;

    fn set(&mut self, path: &str, value: Value);

    fn delete(&mut self, path: &str);

    /// Keys of the object stored at `path`, empty when it is missing or not an object.
    fn child_keys(&self, path: &str) -> Vec<String>;
}

pub fn unit_path(name: &str, key: &str) -> String {
    format!("{}.{}.{}", UNITS_KEY, name, key)
}

pub fn unit_root(name: &str) -> String {
    format!("{}.{}", UNITS_KEY, name)
}

pub fn room_path(room_name: screeps::RoomName, key: &str) -> String {
    format!("{}.{}.{}", ROOMS_KEY, room_name, key)
}

pub fn get_typed<T>(memory: &dyn MemoryStore, path: &str) -> Result<Option<T>, String>
where
    T: DeserializeOwned,
{
    match memory.get(path) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| format!("{}: {}", path, e)),
    }
}

pub fn set_typed<T>(memory: &mut dyn MemoryStore, path: &str, value: &T) -> Result<(), String>
where
    T: Serialize,
{
    let value = serde_json::to_value(value).map_err(|e| e.to_string())?;

    memory.set(path, value);

    Ok(())
}

/// `MemoryStore` backed by a single JSON document, saved and loaded as one
/// string the same way the game's raw memory is.
#[derive(Clone, Debug)]
pub struct JsonMemory {
    root: Value,
}

impl Default for JsonMemory {
    fn default() -> Self {
        JsonMemory::new()
    }
}

impl JsonMemory {
    pub fn new() -> JsonMemory {
        JsonMemory {
            root: Value::Object(Map::new()),
        }
    }

    pub fn load(raw: &str) -> JsonMemory {
        if raw.trim().is_empty() {
            return JsonMemory::new();
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(root @ Value::Object(_)) => JsonMemory { root },
            Ok(_) => {
                error!("Memory root is not an object, starting from empty memory");

                JsonMemory::new()
            }
            Err(err) => {
                error!("Failed to parse memory, starting from empty memory: {}", err);

                JsonMemory::new()
            }
        }
    }

    pub fn save(&self) -> String {
        self.root.to_string()
    }

    pub fn root(&self) -> &Value {
        &self.root
    }
}

impl MemoryStore for JsonMemory {
    fn get(&self, path: &str) -> Option<Value> {
        let mut current = &self.root;

        for key in path.split('.') {
            current = current.as_object()?.get(key)?;
        }

        Some(current.clone())
    }

    fn set(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = path.split('.').collect();

        let Some((last, parents)) = parts.split_last() else {
            return;
        };

        let mut current = &mut self.root;

        for key in parents {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }

            let Some(object) = current.as_object_mut() else {
                return;
            };

            current = object.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        }

        if !current.is_object() {
            *current = Value::Object(Map::new());
        }

        if let Some(object) = current.as_object_mut() {
            object.insert(last.to_string(), value);
        }
    }

    fn delete(&mut self, path: &str) {
        let parts: Vec<&str> = path.split('.').collect();

        let Some((last, parents)) = parts.split_last() else {
            return;
        };

        let mut current = &mut self.root;

        for key in parents {
            match current.as_object_mut().and_then(|o| o.get_mut(*key)) {
                Some(next) => current = next,
                None => return,
            }
        }

        if let Some(object) = current.as_object_mut() {
            object.remove(*last);
        }
    }

    fn child_keys(&self, path: &str) -> Vec<String> {
        self.get(path)
            .and_then(|v| v.as_object().map(|o| o.keys().cloned().collect()))
            .unwrap_or_default()
    }
}
