//! Build / upgrade / demolish commands against the grid and the ledger.
//!
//! Every branch validates first and mutates last: a rejected command leaves
//! the grid (including its version) and the ledger exactly as they were.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    buildings::{self, BuildingDefinition, Cost},
    grid::{BuildingType, ResourceType, Tile, TilePatch, MAX_LEVEL},
    world::{EventKind, World},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransactionOutcome {
    Built { building: BuildingType },
    Upgraded { building: BuildingType, level: u8 },
    Demolished { building: BuildingType, wood_bonus: f64 },
    Rejected { reason: RejectReason },
}

impl TransactionOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, TransactionOutcome::Rejected { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    OutOfBounds,
    Unexplored,
    Occupied,
    NothingToDemolish,
    MaxLevel,
    NeedsLand,
    NeedsWater,
    InsufficientResources { cost: Cost },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutOfBounds => write!(f, "outside the map"),
            RejectReason::Unexplored => write!(f, "that land has not been explored"),
            RejectReason::Occupied => write!(f, "the tile is already occupied"),
            RejectReason::NothingToDemolish => write!(f, "there is nothing to demolish"),
            RejectReason::MaxLevel => write!(f, "already at max level"),
            RejectReason::NeedsLand => write!(f, "only ports and roads can go on water"),
            RejectReason::NeedsWater => write!(f, "ports must be built on water"),
            RejectReason::InsufficientResources { cost } => write!(
                f,
                "not enough resources (needs ${:.0}, {:.0} wood, {:.0} stone)",
                cost.money, cost.wood, cost.stone
            ),
        }
    }
}

/// Applies `tool` at (x, y). Precedence: upgrade when the tile already holds
/// `tool`, demolish when `tool` is [`BuildingType::None`], otherwise build.
pub fn apply_tool(world: &mut World, x: i32, y: i32, tool: BuildingType) -> TransactionOutcome {
    let Some(tile) = world.grid.get(x, y).cloned() else {
        return TransactionOutcome::Rejected {
            reason: RejectReason::OutOfBounds,
        };
    };

    // Only the empty tool has no definition.
    let outcome = match buildings::definition(tool) {
        Some(def) if tile.building == tool => upgrade(world, &tile, def),
        Some(def) => build(world, &tile, def),
        None => demolish(world, &tile),
    };

    debug!(x, y, ?tool, ?outcome, "tool applied");
    notify(world, &tile, tool, &outcome);
    outcome
}

fn upgrade(world: &mut World, tile: &Tile, def: &BuildingDefinition) -> TransactionOutcome {
    if tile.level >= MAX_LEVEL {
        return reject(RejectReason::MaxLevel);
    }
    let cost = def.upgrade_cost(tile.level, world.balance.upgrade_cost_multiplier);
    let Some(stats) = world.stats.debited(&cost) else {
        return reject(RejectReason::InsufficientResources { cost });
    };
    let level = tile.level + 1;
    let grid = world
        .grid
        .replace_tile(tile.x, tile.y, TilePatch::default().level(level))
        .with_land_values_around(tile.x, tile.y);
    world.grid = grid;
    world.stats = stats;
    TransactionOutcome::Upgraded {
        building: tile.building,
        level,
    }
}

fn demolish(world: &mut World, tile: &Tile) -> TransactionOutcome {
    if !tile.explored {
        return reject(RejectReason::Unexplored);
    }
    if !tile.has_building() {
        return reject(RejectReason::NothingToDemolish);
    }
    let fee = Cost::new(world.balance.demolish_fee, 0.0, 0.0);
    let Some(mut stats) = world.stats.debited(&fee) else {
        return reject(RejectReason::InsufficientResources { cost: fee });
    };
    let wood_bonus = if tile.resource == ResourceType::Forest {
        world.balance.demolish_forest_wood
    } else {
        0.0
    };
    stats.wood += wood_bonus;
    let grid = world
        .grid
        .replace_tile(
            tile.x,
            tile.y,
            TilePatch::default().building(BuildingType::None).level(1),
        )
        .with_land_values_around(tile.x, tile.y);
    world.grid = grid;
    world.stats = stats;
    TransactionOutcome::Demolished {
        building: tile.building,
        wood_bonus,
    }
}

fn build(world: &mut World, tile: &Tile, def: &BuildingDefinition) -> TransactionOutcome {
    let tool = def.kind;
    if !tile.explored {
        return reject(RejectReason::Unexplored);
    }
    if tile.has_building() {
        return reject(RejectReason::Occupied);
    }
    if tile.is_water() && !matches!(tool, BuildingType::Port | BuildingType::Road) {
        return reject(RejectReason::NeedsLand);
    }
    if tool == BuildingType::Port && !tile.is_water() {
        return reject(RejectReason::NeedsWater);
    }
    let cost = def.cost;
    let Some(stats) = world.stats.debited(&cost) else {
        return reject(RejectReason::InsufficientResources { cost });
    };
    let grid = world
        .grid
        .replace_tile(tile.x, tile.y, TilePatch::default().building(tool).level(1))
        .with_land_values_around(tile.x, tile.y);
    world.grid = grid;
    world.stats = stats;
    if tool == BuildingType::Port {
        let id = world.spawn_explorer(f64::from(tile.x), f64::from(tile.y));
        debug!(id, x = tile.x, y = tile.y, "explorer launched");
    }
    TransactionOutcome::Built { building: tool }
}

fn reject(reason: RejectReason) -> TransactionOutcome {
    TransactionOutcome::Rejected { reason }
}

fn notify(world: &mut World, tile: &Tile, tool: BuildingType, outcome: &TransactionOutcome) {
    let (kind, message) = match outcome {
        TransactionOutcome::Built { building } => (
            EventKind::Success,
            format!("Built {} at ({}, {})", building.label(), tile.x, tile.y),
        ),
        TransactionOutcome::Upgraded { building, level } => (
            EventKind::Success,
            format!("{} upgraded to level {level}", building.label()),
        ),
        TransactionOutcome::Demolished { building, wood_bonus } if *wood_bonus > 0.0 => (
            EventKind::Info,
            format!(
                "Demolished {} and salvaged {wood_bonus:.0} wood",
                building.label()
            ),
        ),
        TransactionOutcome::Demolished { building, .. } => (
            EventKind::Info,
            format!("Demolished {}", building.label()),
        ),
        TransactionOutcome::Rejected { reason } => (
            EventKind::Warning,
            format!("Cannot use {}: {reason}", tool.label()),
        ),
    };
    world.record(kind, message);
}
