use crate::constants::*;
use crate::memory::*;
use crate::room::snapshot::*;
use crate::unit::*;
use crate::world::*;
use log::*;
use screeps::{Part, StructureType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Body layout for a role: `pre` once, `repeat` as often as energy and the
/// part cap allow, `post` once.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyTemplate {
    pub pre: Vec<Part>,
    pub repeat: Vec<Part>,
    pub post: Vec<Part>,
    pub min_repeat: Option<usize>,
    pub max_repeat: Option<usize>,
}

impl BodyTemplate {
    pub fn repeating(repeat: &[Part], max_repeat: usize) -> BodyTemplate {
        BodyTemplate {
            repeat: repeat.to_vec(),
            min_repeat: Some(1),
            max_repeat: Some(max_repeat),
            ..Default::default()
        }
    }
}

pub fn body_cost(body: &[Part]) -> u32 {
    body.iter().map(|p| part_cost(*p)).sum()
}

pub fn create_body(template: &BodyTemplate, maximum_energy: u32) -> Result<Vec<Part>, String> {
    let fixed_body_cost = body_cost(&template.pre) + body_cost(&template.post);

    if fixed_body_cost > maximum_energy {
        return Err(format!("Fixed body cost {} exceeds {} energy", fixed_body_cost, maximum_energy));
    }

    let fixed_body_length = template.pre.len() + template.post.len();

    if fixed_body_length > MAX_CREEP_SIZE {
        return Err(format!("Fixed body has {} parts", fixed_body_length));
    }

    let repeat_body_cost = body_cost(&template.repeat);

    let max_repeat_by_cost = if repeat_body_cost > 0 {
        ((maximum_energy - fixed_body_cost) / repeat_body_cost) as usize
    } else {
        0
    };

    let max_repeat_by_length = if !template.repeat.is_empty() {
        (MAX_CREEP_SIZE - fixed_body_length) / template.repeat.len()
    } else {
        0
    };

    let max_possible_repeat = max_repeat_by_cost.min(max_repeat_by_length);

    if let Some(min_repeat) = template.min_repeat {
        if max_possible_repeat < min_repeat {
            return Err(format!("Only {} repeats fit, {} required", max_possible_repeat, min_repeat));
        }
    }

    let repeat_parts = max_possible_repeat
        .max(template.min_repeat.unwrap_or(0))
        .min(template.max_repeat.unwrap_or(usize::MAX));

    let body = template
        .pre
        .iter()
        .chain(template.repeat.iter().cycle().take(repeat_parts * template.repeat.len()))
        .chain(template.post.iter())
        .cloned()
        .collect::<Vec<Part>>();

    if body.is_empty() {
        return Err("Body template produced no parts".to_string());
    }

    Ok(body)
}

/// Per-room quota for one role. Roles are spawned in configuration order.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleQuota<'a> {
    pub name: &'a str,
    pub quota: u32,
    pub body: &'a BodyTemplate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpawnPlan {
    pub role: String,
    pub body: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpawnDecision {
    /// Every role is at quota.
    Satisfied,
    /// The highest priority role under quota cannot be afforded yet.
    Waiting { role: String },
    Spawn(SpawnPlan),
}

/// Picks the next unit to spawn. When the room has none of the first role
/// left the body is scaled to the energy available right now so the room can
/// recover; otherwise it is scaled to full capacity and the room waits until
/// it can afford it.
pub fn plan_spawn(roles: &[RoleQuota], counts: &HashMap<String, u32>, energy_available: u32, energy_capacity: u32) -> SpawnDecision {
    let recovering = roles
        .first()
        .map(|first| first.quota > 0 && counts.get(first.name).copied().unwrap_or(0) == 0)
        .unwrap_or(false);

    let budget = if recovering { energy_available } else { energy_capacity };

    let Some(role) = roles.iter().find(|r| counts.get(r.name).copied().unwrap_or(0) < r.quota) else {
        return SpawnDecision::Satisfied;
    };

    match create_body(role.body, budget) {
        Ok(body) if body_cost(&body) <= energy_available => SpawnDecision::Spawn(SpawnPlan {
            role: role.name.to_string(),
            body,
        }),
        Ok(_) => SpawnDecision::Waiting { role: role.name.to_string() },
        Err(err) => {
            trace!("Unable to build {} body from {} energy: {}", role.name, budget, err);

            SpawnDecision::Waiting { role: role.name.to_string() }
        }
    }
}

/// Counts the room's own units per role from their memory.
pub fn count_roles(snapshot: &RoomSnapshot, memory: &dyn MemoryStore) -> HashMap<String, u32> {
    let mut counts = HashMap::new();

    for unit in snapshot.units.iter().filter(|u| u.my) {
        if let Some(role) = memory.get(&unit_path(&unit.name, ROLE_KEY)).and_then(|v| v.as_str().map(|s| s.to_owned())) {
            *counts.entry(role).or_insert(0) += 1;
        }
    }

    counts
}

/// Runs the spawn planner for a room and issues the spawn on the first idle
/// spawn. Returns the name of the new unit.
pub fn run_spawning<G>(
    game: &mut G,
    memory: &mut dyn MemoryStore,
    snapshot: &RoomSnapshot,
    roles: &[RoleQuota],
) -> Result<Option<String>, String>
where
    G: Game + ?Sized,
{
    let Some(spawn) = snapshot.my_structures_of(StructureType::Spawn).find(|s| !s.spawning) else {
        return Ok(None);
    };

    let (energy_available, energy_capacity) = game.room_energy(snapshot.room_name);
    let counts = count_roles(snapshot, memory);

    let plan = match plan_spawn(roles, &counts, energy_available, energy_capacity) {
        SpawnDecision::Spawn(plan) => plan,
        SpawnDecision::Waiting { role } => {
            trace!("{}: waiting for energy to spawn {}", snapshot.room_name, role);

            return Ok(None);
        }
        SpawnDecision::Satisfied => return Ok(None),
    };

    let time = game.time();
    let name = spawn_unit(game, &spawn.id, &plan, time)?;

    memory.set(&unit_root(&name), json!({ ROLE_KEY: plan.role, TASK_KEY: [] }));

    info!("{}: spawning {} ({} parts)", snapshot.room_name, name, plan.body.len());

    Ok(Some(name))
}

fn spawn_unit<G>(game: &mut G, spawn: &ObjectHandle, plan: &SpawnPlan, time: u32) -> Result<String, String>
where
    G: Game + ?Sized,
{
    let mut additional = 0;

    loop {
        let name = format!("{}-{}-{}", plan.role, time, additional);

        match game.spawn_unit(spawn, &plan.body, &name) {
            ActionCode::Ok => return Ok(name),
            ActionCode::NameExists => additional += 1,
            code => return Err(format!("Failed to spawn {}: {:?}", name, code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> BodyTemplate {
        BodyTemplate::repeating(&[Part::Work, Part::Carry, Part::Move], 5)
    }

    #[test]
    fn body_scales_with_energy() {
        assert_eq!(create_body(&worker(), 300).unwrap().len(), 3);
        assert_eq!(create_body(&worker(), 550).unwrap().len(), 6);
        assert_eq!(create_body(&worker(), 10_000).unwrap().len(), 15);
    }

    #[test]
    fn body_respects_part_cap() {
        let template = BodyTemplate {
            repeat: vec![Part::Move],
            ..Default::default()
        };

        assert_eq!(create_body(&template, 100_000).unwrap().len(), MAX_CREEP_SIZE);
    }

    #[test]
    fn body_requires_minimum_repeat() {
        assert!(create_body(&worker(), 100).is_err());
    }

    #[test]
    fn recovery_spends_available_energy() {
        let harvester = worker();
        let roles = [RoleQuota { name: "harvester", quota: 2, body: &harvester }];

        let decision = plan_spawn(&roles, &HashMap::new(), 300, 800);

        assert_eq!(
            decision,
            SpawnDecision::Spawn(SpawnPlan {
                role: "harvester".to_string(),
                body: vec![Part::Work, Part::Carry, Part::Move],
            })
        );
    }

    #[test]
    fn waits_for_full_body_when_not_recovering() {
        let harvester = worker();
        let upgrader = worker();
        let roles = [
            RoleQuota { name: "harvester", quota: 1, body: &harvester },
            RoleQuota { name: "upgrader", quota: 1, body: &upgrader },
        ];

        let counts: HashMap<String, u32> = [("harvester".to_string(), 1)].into_iter().collect();

        assert_eq!(plan_spawn(&roles, &counts, 300, 800), SpawnDecision::Waiting { role: "upgrader".to_string() });
        assert!(matches!(plan_spawn(&roles, &counts, 800, 800), SpawnDecision::Spawn(_)));
    }

    #[test]
    fn satisfied_when_all_quotas_met() {
        let harvester = worker();
        let roles = [RoleQuota { name: "harvester", quota: 1, body: &harvester }];
        let counts: HashMap<String, u32> = [("harvester".to_string(), 1)].into_iter().collect();

        assert_eq!(plan_spawn(&roles, &counts, 800, 800), SpawnDecision::Satisfied);
    }
}
