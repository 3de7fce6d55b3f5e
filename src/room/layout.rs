use screeps::StructureType;
use serde::{Deserialize, Serialize};

/// ASCII structure layout, centered on the room's first spawn. Unlocked once
/// the controller reaches `min_level`.
///
/// Legend: `S` spawn, `E` extension, `T` tower, `O` storage, `C` container,
/// `R` road, `L` link, `.` or space for nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutTemplate {
    pub min_level: u8,
    pub rows: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutPlacement {
    pub dx: i8,
    pub dy: i8,
    pub structure_type: StructureType,
}

pub fn structure_for_symbol(symbol: char) -> Result<Option<StructureType>, String> {
    match symbol {
        'S' => Ok(Some(StructureType::Spawn)),
        'E' => Ok(Some(StructureType::Extension)),
        'T' => Ok(Some(StructureType::Tower)),
        'O' => Ok(Some(StructureType::Storage)),
        'C' => Ok(Some(StructureType::Container)),
        'R' => Ok(Some(StructureType::Road)),
        'L' => Ok(Some(StructureType::Link)),
        '.' | ' ' => Ok(None),
        other => Err(format!("Unknown layout symbol '{}'", other)),
    }
}

impl LayoutTemplate {
    pub fn new(min_level: u8, rows: &[&str]) -> LayoutTemplate {
        LayoutTemplate {
            min_level,
            rows: rows.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Placements as offsets from the template center.
    pub fn placements(&self) -> Result<Vec<LayoutPlacement>, String> {
        let height = self.rows.len() as i32;
        let width = self.rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;

        if height > i8::MAX as i32 || width > i8::MAX as i32 {
            return Err("Layout template too large".to_string());
        }

        let center_y = height / 2;
        let center_x = width / 2;

        let mut placements = Vec::new();

        for (row_index, row) in self.rows.iter().enumerate() {
            for (column_index, symbol) in row.chars().enumerate() {
                if let Some(structure_type) = structure_for_symbol(symbol)? {
                    placements.push(LayoutPlacement {
                        dx: (column_index as i32 - center_x) as i8,
                        dy: (row_index as i32 - center_y) as i8,
                        structure_type,
                    });
                }
            }
        }

        Ok(placements)
    }
}

pub fn default_layouts() -> Vec<LayoutTemplate> {
    vec![
        LayoutTemplate::new(2, &[
            "ERERE",
            "R.R.R",
            "E.S.E",
            "R.R.R",
            ".R.R.",
        ]),
        LayoutTemplate::new(3, &[
            "E.E.E.E",
            ".......",
            "E.....E",
            "...S...",
            "E.....E",
            ".......",
            "E.ETE.E",
        ]),
        LayoutTemplate::new(4, &[
            "....O....",
            ".........",
            ".........",
            ".........",
            "....S....",
            ".........",
            ".........",
            ".........",
            "E.E...E.E",
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placements_are_centered() {
        let template = LayoutTemplate::new(1, &["E.R", ".S.", "T.."]);

        let placements = template.placements().unwrap();

        assert_eq!(
            placements,
            vec![
                LayoutPlacement { dx: -1, dy: -1, structure_type: StructureType::Extension },
                LayoutPlacement { dx: 1, dy: -1, structure_type: StructureType::Road },
                LayoutPlacement { dx: 0, dy: 0, structure_type: StructureType::Spawn },
                LayoutPlacement { dx: -1, dy: 1, structure_type: StructureType::Tower },
            ]
        );
    }

    #[test]
    fn unknown_symbols_are_rejected() {
        assert!(LayoutTemplate::new(1, &["EXE"]).placements().is_err());
    }

    #[test]
    fn default_layouts_parse() {
        for layout in default_layouts() {
            assert!(layout.placements().is_ok());
        }
    }
}
