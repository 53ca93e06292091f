use anyhow::Result;
use tracing::debug;

use crate::{
    engine::{Driver, System, SystemContext},
    grid::{Grid, ResourceType},
    rng::SystemRng,
    world::{EventKind, ExplorerState, World},
};

pub struct ExplorerSystem;

impl ExplorerSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExplorerSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Haul {
    tiles: u32,
    wood: f64,
    stone: f64,
    money: f64,
}

impl System for ExplorerSystem {
    fn name(&self) -> &str {
        "explorers"
    }

    fn driver(&self) -> Driver {
        Driver::Explorers
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if world.explorers.is_empty() {
            return Ok(());
        }
        if !world.grid.has_unexplored() {
            for explorer in world.explorers.iter_mut() {
                explorer.state = ExplorerState::Idle;
                explorer.target = None;
            }
            return Ok(());
        }

        let balance = world.balance.explorers.clone();
        let mut haul = Haul::default();
        for index in 0..world.explorers.len() {
            let stale = match world.explorers[index].target {
                None => true,
                Some((tx, ty)) => world.grid.get(tx, ty).map_or(true, |tile| tile.explored),
            };
            if stale {
                let explorer = &world.explorers[index];
                let next = nearest_unexplored(&world.grid, explorer.x, explorer.y);
                let explorer = &mut world.explorers[index];
                explorer.target = next;
                explorer.state = if next.is_some() {
                    ExplorerState::Exploring
                } else {
                    ExplorerState::Idle
                };
            }

            let explorer = &mut world.explorers[index];
            let Some((tx, ty)) = explorer.target else {
                continue;
            };
            let (tx, ty) = (f64::from(tx), f64::from(ty));
            explorer.x += step(tx - explorer.x, balance.speed);
            explorer.y += step(ty - explorer.y, balance.speed);
            let gap = (tx - explorer.x).abs().max((ty - explorer.y).abs());
            if gap > balance.reach {
                continue;
            }

            let Some((cx, cy)) = explorer.target.take() else {
                continue;
            };
            let id = explorer.id;
            let (grid, found) = world.grid.reveal_area(cx, cy, balance.reveal_radius);
            world.grid = grid;
            for tile in &found {
                match tile.resource {
                    ResourceType::Forest => haul.wood += balance.wood_reward,
                    ResourceType::Stone => haul.stone += balance.stone_reward,
                    _ => continue,
                }
                haul.money += balance.money_bonus;
                haul.tiles += 1;
            }
            debug!(id, x = cx, y = cy, found = found.len(), "explorer reached target");
        }

        if haul.tiles > 0 {
            let stats = &mut world.stats;
            stats.wood += haul.wood;
            stats.stone += haul.stone;
            stats.money += haul.money;
            world.record(
                EventKind::Info,
                format!(
                    "Explorers charted {} resource site(s): +{:.0} wood, +{:.0} stone, +${:.0}",
                    haul.tiles, haul.wood, haul.stone, haul.money
                ),
            );
        }
        Ok(())
    }
}

/// Nearest unexplored tile by Manhattan distance; ties keep row-major order.
fn nearest_unexplored(grid: &Grid, x: f64, y: f64) -> Option<(i32, i32)> {
    grid.tiles()
        .filter(|tile| !tile.explored)
        .map(|tile| {
            let distance = (f64::from(tile.x) - x).abs() + (f64::from(tile.y) - y).abs();
            (tile.x, tile.y, distance)
        })
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(tx, ty, _)| (tx, ty))
}

fn step(delta: f64, speed: f64) -> f64 {
    if delta > 0.0 {
        speed
    } else if delta < 0.0 {
        -speed
    } else {
        0.0
    }
}
