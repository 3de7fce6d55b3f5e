use crate::memory::*;
use crate::pathing::*;
use crate::room::buildqueue::ConstructionConfig;
use crate::room::layout::*;
use crate::spawn::*;
use crate::tasks::data::ActionVerb;
use crate::tasks::rules::*;
use log::*;
use screeps::Part;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default)]
    pub quota: u32,
    #[serde(default)]
    pub body: BodyTemplate,
    #[serde(default)]
    pub rules: Vec<TaskRule>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub weights: CostWeights,
    pub pathing: PathingConfig,
    pub overlay: OverlayOptions,
    pub roles: Vec<RoleConfig>,
    pub layouts: Vec<LayoutTemplate>,
    pub construction: ConstructionConfig,
}

impl Default for AgentConfig {
    fn default() -> AgentConfig {
        AgentConfig {
            weights: CostWeights::default(),
            pathing: PathingConfig::default(),
            overlay: OverlayOptions::default(),
            roles: default_roles(),
            layouts: default_layouts(),
            construction: ConstructionConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn load(memory: &dyn MemoryStore) -> AgentConfig {
        match get_typed::<AgentConfig>(memory, CONFIG_KEY) {
            Ok(Some(config)) => config,
            Ok(None) => AgentConfig::default(),
            Err(err) => {
                warn!("Ignoring malformed {}: {}", CONFIG_KEY, err);

                AgentConfig::default()
            }
        }
    }

    pub fn role(&self, name: &str) -> Option<&RoleConfig> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn quotas(&self) -> Vec<RoleQuota> {
        self.roles
            .iter()
            .map(|r| RoleQuota {
                name: &r.name,
                quota: r.quota,
                body: &r.body,
            })
            .collect()
    }
}

fn role(name: &str, quota: u32, body: BodyTemplate, rules: Vec<TaskRule>) -> RoleConfig {
    RoleConfig {
        name: name.to_string(),
        quota,
        body,
        rules,
    }
}

pub fn default_roles() -> Vec<RoleConfig> {
    use ActionVerb::*;
    use Predicate::*;
    use TargetKind::*;

    let worker = BodyTemplate::repeating(&[Part::Work, Part::Carry, Part::Move], 5);
    let carrier = BodyTemplate::repeating(&[Part::Carry, Part::Carry, Part::Move], 8);
    let fighter = BodyTemplate::repeating(&[Part::Attack, Part::Move], 10);

    let has_energy = UsedCapacityAbove(0);

    vec![
        role(
            "harvester",
            2,
            worker.clone(),
            vec![
                TaskRule::new(TaskRule::closest(SpawnEnergy), Transfer).when(IsFull),
                TaskRule::new(TaskRule::closest(Tower), Transfer).when(IsFull),
                TaskRule::new(TaskRule::closest(ConstructionSite), Build).when(IsFull),
                TaskRule::new(TargetSelector::Controller, Upgrade).when(IsFull),
                TaskRule::new(TaskRule::closest(Source), Harvest)
                    .when(Not(Box::new(IsFull)))
                    .validate(TargetNotOverAssigned),
            ],
        ),
        role(
            "upgrader",
            2,
            worker.clone(),
            vec![
                TaskRule::new(TaskRule::closest(EnergyStore), Withdraw).when(IsEmpty),
                TaskRule::new(TaskRule::closest(DroppedEnergy), Pickup).when(IsEmpty),
                TaskRule::new(TaskRule::closest(Source), Harvest)
                    .when(IsEmpty)
                    .validate(TargetNotOverAssigned),
                TaskRule::new(TargetSelector::Controller, Upgrade).when(has_energy.clone()),
            ],
        ),
        role(
            "builder",
            1,
            worker,
            vec![
                TaskRule::new(TaskRule::closest(EnergyStore), Withdraw).when(IsEmpty),
                TaskRule::new(TaskRule::closest(Source), Harvest)
                    .when(IsEmpty)
                    .validate(TargetNotOverAssigned),
                TaskRule::new(TaskRule::closest_by_path(ConstructionSite), Build)
                    .when(has_energy.clone())
                    .when(ConstructionSitesPresent),
                TaskRule::new(TaskRule::closest(DamagedStructure), Repair).when(has_energy.clone()),
                TaskRule::new(TargetSelector::Controller, Upgrade).when(has_energy.clone()),
            ],
        ),
        role(
            "hauler",
            0,
            carrier,
            vec![
                TaskRule::new(TaskRule::closest(DroppedEnergy), Pickup).when(IsEmpty),
                TaskRule::new(TaskRule::closest(EnergyStore), Withdraw).when(IsEmpty),
                TaskRule::new(TaskRule::closest(SpawnEnergy), Transfer).when(has_energy.clone()),
                TaskRule::new(TaskRule::closest(Tower), Transfer).when(has_energy.clone()),
                TaskRule::new(TaskRule::closest(Storage), Transfer).when(has_energy),
            ],
        ),
        role(
            "defender",
            0,
            fighter,
            vec![TaskRule::new(TaskRule::closest(Hostile), Attack).when(HostilesPresent)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_use_defaults() {
        let mut memory = JsonMemory::new();
        memory.set(CONFIG_KEY, json!({ "pathing": { "stuck_threshold": 7 } }));

        let config = AgentConfig::load(&memory);

        assert_eq!(config.pathing.stuck_threshold, 7);
        assert_eq!(config.weights, CostWeights::default());
        assert_eq!(config.roles, default_roles());
    }

    #[test]
    fn malformed_config_falls_back() {
        let mut memory = JsonMemory::new();
        memory.set(CONFIG_KEY, json!({ "roles": "everyone" }));

        assert_eq!(AgentConfig::load(&memory), AgentConfig::default());
    }

    #[test]
    fn roles_can_be_replaced() {
        let mut memory = JsonMemory::new();
        memory.set(
            CONFIG_KEY,
            json!({
                "roles": [{
                    "name": "scout",
                    "quota": 1,
                    "rules": [{ "target": { "type": "position", "x": 25, "y": 25 }, "action": "move" }]
                }]
            }),
        );

        let config = AgentConfig::load(&memory);

        assert_eq!(config.roles.len(), 1);
        assert_eq!(config.role("scout").map(|r| r.rules.len()), Some(1));
        assert!(config.role("harvester").is_none());
    }
}
