use serde::{Deserialize, Serialize};

use crate::grid::BuildingType;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cost {
    pub money: f64,
    pub wood: f64,
    pub stone: f64,
}

impl Cost {
    pub const fn new(money: f64, wood: f64, stone: f64) -> Self {
        Self { money, wood, stone }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            money: self.money * factor,
            wood: self.wood * factor,
            stone: self.stone * factor,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildingDefinition {
    pub kind: BuildingType,
    pub cost: Cost,
    /// Money per economy tick at level 1 and land value 1.0.
    pub income: f64,
    /// Population growth per economy tick at level 1 and land value 1.0.
    pub population: f64,
}

impl BuildingDefinition {
    /// Cost of taking this building from `level` to `level + 1`.
    pub fn upgrade_cost(&self, level: u8, multiplier: f64) -> Cost {
        self.cost.scaled(multiplier.powi(i32::from(level)))
    }
}

const BUILDINGS: &[BuildingDefinition] = &[
    BuildingDefinition {
        kind: BuildingType::Road,
        cost: Cost::new(10.0, 0.0, 2.0),
        income: 0.0,
        population: 0.0,
    },
    BuildingDefinition {
        kind: BuildingType::Residential,
        cost: Cost::new(60.0, 15.0, 0.0),
        income: 1.0,
        population: 5.0,
    },
    BuildingDefinition {
        kind: BuildingType::Commercial,
        cost: Cost::new(100.0, 20.0, 5.0),
        income: 12.0,
        population: 0.0,
    },
    BuildingDefinition {
        kind: BuildingType::Industrial,
        cost: Cost::new(150.0, 15.0, 20.0),
        income: 0.0,
        population: 0.0,
    },
    BuildingDefinition {
        kind: BuildingType::Park,
        cost: Cost::new(40.0, 10.0, 0.0),
        income: 0.0,
        population: 1.0,
    },
    BuildingDefinition {
        kind: BuildingType::Farm,
        cost: Cost::new(50.0, 10.0, 0.0),
        income: 0.0,
        population: 0.0,
    },
    BuildingDefinition {
        kind: BuildingType::Defense,
        cost: Cost::new(120.0, 10.0, 30.0),
        income: 0.0,
        population: 0.0,
    },
    BuildingDefinition {
        kind: BuildingType::Port,
        cost: Cost::new(200.0, 40.0, 20.0),
        income: 0.0,
        population: 0.0,
    },
];

/// `None` for the empty tile, which has no definition.
pub fn definition(kind: BuildingType) -> Option<&'static BuildingDefinition> {
    BUILDINGS.iter().find(|def| def.kind == kind)
}
