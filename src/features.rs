use crate::memory::*;
use serde::{Deserialize, Serialize};

/// Runtime toggles stored under `_features`. Re-read every tick so they can
/// be flipped from the game console.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub visualize: bool,
    pub debug: bool,
    pub construction: bool,
    pub spawning: bool,
    pub reset_memory: bool,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            visualize: false,
            debug: false,
            construction: true,
            spawning: true,
            reset_memory: false,
        }
    }
}

impl Features {
    pub fn load(memory: &dyn MemoryStore) -> Features {
        match get_typed::<Features>(memory, FEATURES_KEY) {
            Ok(Some(features)) => features,
            Ok(None) => Features::default(),
            Err(err) => {
                log::warn!("Ignoring unreadable feature flags: {}", err);

                Features::default()
            }
        }
    }
}

pub mod reset {
    use crate::memory::*;

    pub fn clear(memory: &mut dyn MemoryStore) {
        memory.set(&format!("{}.reset_memory", FEATURES_KEY), serde_json::Value::Bool(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_flags_use_defaults() {
        let mut memory = JsonMemory::new();
        memory.set("_features", json!({ "debug": true }));

        let features = Features::load(&memory);

        assert!(features.debug);
        assert!(features.construction);
        assert!(!features.reset_memory);
    }

    #[test]
    fn clear_reset_flag() {
        let mut memory = JsonMemory::new();
        memory.set("_features.reset_memory", json!(true));

        assert!(Features::load(&memory).reset_memory);

        reset::clear(&mut memory);

        assert!(!Features::load(&memory).reset_memory);
    }
}
