//
// Game constants the core needs without touching the live game API.
//

pub const ROOM_SIZE: u8 = 50;
pub const ROOM_AREA: usize = (ROOM_SIZE as usize) * (ROOM_SIZE as usize);

pub const MAX_CREEP_SIZE: usize = 50;

pub const HARVEST_POWER: u32 = 2;
pub const BUILD_POWER: u32 = 5;
pub const REPAIR_POWER: u32 = 100;
pub const UPGRADE_CONTROLLER_POWER: u32 = 1;
pub const CARRY_CAPACITY: u32 = 50;

pub const UPGRADE_RANGE: u32 = 3;
pub const BUILD_RANGE: u32 = 3;
pub const REPAIR_RANGE: u32 = 3;
pub const ADJACENT_RANGE: u32 = 1;

pub const COST_MATRIX_BLOCKED: u8 = 255;
pub const COST_MATRIX_MAX_WALKABLE: u8 = 254;

pub const MAX_CONSTRUCTION_SITES_PER_ROOM: usize = 5;

/// Structure counts allowed per controller level (index = level).
pub fn controller_structure_limit(structure_type: screeps::StructureType, level: u8) -> u32 {
    use screeps::StructureType;

    const SPAWNS: [u32; 9] = [0, 1, 1, 1, 1, 1, 1, 2, 3];
    const EXTENSIONS: [u32; 9] = [0, 0, 5, 10, 20, 30, 40, 50, 60];
    const TOWERS: [u32; 9] = [0, 0, 0, 1, 1, 2, 2, 3, 6];
    const LINKS: [u32; 9] = [0, 0, 0, 0, 0, 2, 3, 4, 6];
    const STORAGE: [u32; 9] = [0, 0, 0, 0, 1, 1, 1, 1, 1];

    let level = (level as usize).min(8);

    match structure_type {
        StructureType::Spawn => SPAWNS[level],
        StructureType::Extension => EXTENSIONS[level],
        StructureType::Tower => TOWERS[level],
        StructureType::Link => LINKS[level],
        StructureType::Storage => STORAGE[level],
        StructureType::Container => 5,
        StructureType::Road => 2500,
        _ => 0,
    }
}

pub fn part_cost(part: screeps::Part) -> u32 {
    use screeps::Part;

    match part {
        Part::Move => 50,
        Part::Work => 100,
        Part::Carry => 50,
        Part::Attack => 80,
        Part::RangedAttack => 150,
        Part::Heal => 250,
        Part::Claim => 600,
        Part::Tough => 10,
        _ => 0,
    }
}
