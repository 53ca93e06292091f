use super::{BuildingType, Grid, ResourceType};

pub const MIN_LAND_VALUE: f64 = 0.5;
pub const MAX_LAND_VALUE: f64 = 2.5;

/// Desirability of (x, y) from its 8-neighbourhood. Out-of-bounds tiles
/// contribute nothing; an out-of-bounds centre scores the neutral 1.0.
pub fn land_value(grid: &Grid, x: i32, y: i32) -> f64 {
    let mut value = 1.0;
    for neighbor in grid.neighbors(x, y) {
        value += match neighbor.resource {
            ResourceType::Water => 0.1,
            ResourceType::Forest => 0.05,
            ResourceType::Stone | ResourceType::None => 0.0,
        };
        value += match neighbor.building {
            BuildingType::Park => 0.2,
            BuildingType::Industrial => -0.15,
            BuildingType::Defense => 0.05,
            _ => 0.0,
        };
        if neighbor.level > 1 {
            value += 0.1 * f64::from(neighbor.level - 1);
        }
    }
    value.clamp(MIN_LAND_VALUE, MAX_LAND_VALUE)
}
