use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    engine::{Driver, System, SystemContext},
    grid::{BuildingType, Grid},
    rng::SystemRng,
    scenario::HostileBalance,
    world::{EventKind, HostileAgent, World},
};

pub struct HostileSystem;

impl HostileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HostileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for HostileSystem {
    fn name(&self) -> &str {
        "hostiles"
    }

    fn driver(&self) -> Driver {
        Driver::Hostiles
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        maybe_spawn(world, rng);

        let balance = world.balance.hostiles.clone();
        let targets: Vec<(f64, f64)> = world
            .grid
            .tiles()
            .filter(|tile| tile.building.is_structure())
            .map(|tile| (f64::from(tile.x), f64::from(tile.y)))
            .collect();

        let mut thefts = 0u32;
        for hostile in world.hostiles.iter_mut() {
            if hostile.attack_cooldown > 0 {
                hostile.attack_cooldown -= 1;
            }
            hostile.hp -= defense_damage(&world.grid, hostile, &balance);
            if hostile.is_dead() {
                continue;
            }

            let Some((tx, ty, distance)) = nearest(&targets, hostile.x, hostile.y) else {
                continue;
            };
            if distance > balance.move_threshold {
                hostile.x += balance.speed * direction(tx - hostile.x);
                hostile.y += balance.speed * direction(ty - hostile.y);
            }
            if distance <= balance.attack_range && hostile.attack_cooldown == 0 {
                if rng.chance(balance.attack_chance) {
                    let stats = &mut world.stats;
                    stats.money = (stats.money - balance.steal_money).max(0.0);
                    stats.food = (stats.food - balance.steal_food).max(0.0);
                    thefts += 1;
                    debug!(id = hostile.id, "raider stole supplies");
                }
                hostile.attack_cooldown = balance.attack_cooldown;
            }
        }

        for _ in 0..thefts {
            world.record(
                EventKind::Danger,
                format!(
                    "Raiders stole ${:.0} and {:.0} food",
                    balance.steal_money, balance.steal_food
                ),
            );
        }

        let before = world.hostiles.len();
        world.hostiles.retain(|hostile| !hostile.is_dead());
        let slain = before - world.hostiles.len();
        if slain > 0 {
            info!(slain, "defenses repelled raiders");
            world.record(
                EventKind::Success,
                format!("Defenses repelled {slain} raider(s)"),
            );
        }
        Ok(())
    }
}

fn maybe_spawn(world: &mut World, rng: &mut SystemRng<'_>) {
    let balance = &world.balance.hostiles;
    if world.hostiles.len() >= balance.max_count {
        return;
    }
    let chance = (world.stats.population / balance.spawn_population_divisor)
        .min(balance.max_spawn_chance);
    if !rng.chance(chance) {
        return;
    }
    let edge = world.grid.size().saturating_sub(1) as f64;
    let along = rng.gen::<f64>() * edge;
    let (x, y) = match rng.gen_range(0..4) {
        0 => (along, 0.0),
        1 => (edge, along),
        2 => (along, edge),
        _ => (0.0, along),
    };
    let hp = balance.base_hp + world.stats.era.hostile_hp_bonus();
    let id = world.spawn_hostile(x, y, hp);
    debug!(id, x, y, hp, "raider spawned");
    world.record(EventKind::Warning, "Raiders spotted at the edge of the map");
}

/// Damage dealt this tick by every defense tower in the 3x3 block around the
/// hostile's rounded position.
fn defense_damage(grid: &Grid, hostile: &HostileAgent, balance: &HostileBalance) -> f64 {
    let (cx, cy) = (hostile.x.round() as i32, hostile.y.round() as i32);
    let mut damage = 0.0;
    for y in cy - 1..=cy + 1 {
        for x in cx - 1..=cx + 1 {
            if let Some(tile) = grid.get(x, y) {
                if tile.building == BuildingType::Defense {
                    damage += balance.defense_damage_per_level * f64::from(tile.level);
                }
            }
        }
    }
    damage
}

/// Nearest target by Manhattan distance; ties keep scan order.
fn nearest(targets: &[(f64, f64)], x: f64, y: f64) -> Option<(f64, f64, f64)> {
    targets
        .iter()
        .map(|&(tx, ty)| (tx, ty, (tx - x).abs() + (ty - y).abs()))
        .min_by(|a, b| a.2.total_cmp(&b.2))
}

/// -1, 0 or 1. Unlike `f64::signum`, zero stays zero.
fn direction(delta: f64) -> f64 {
    if delta > 0.0 {
        1.0
    } else if delta < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StrikeOutcome {
    /// No hostile with that id.
    Missed,
    Wounded { hp: f64 },
    Slain,
}

/// A direct hit from the player. Dead hostiles are removed immediately.
pub fn strike(world: &mut World, id: u64) -> StrikeOutcome {
    let damage = world.balance.hostiles.click_damage;
    let Some(index) = world.hostiles.iter().position(|hostile| hostile.id == id) else {
        return StrikeOutcome::Missed;
    };
    let hostile = &mut world.hostiles[index];
    hostile.hp -= damage;
    if !hostile.is_dead() {
        return StrikeOutcome::Wounded { hp: hostile.hp };
    }
    world.hostiles.remove(index);
    world.record(EventKind::Success, "A raider was struck down");
    StrikeOutcome::Slain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{Engine, EngineBuilder, EngineSettings},
        grid::{ResourceType, Tile},
        scenario::Balance,
        world::{CityStats, Era},
    };

    fn world_with(
        size: usize,
        buildings: &[(i32, i32, BuildingType, u8)],
        stats: CityStats,
    ) -> World {
        let tiles = (0..size * size)
            .map(|index| {
                let (x, y) = ((index % size) as i32, (index / size) as i32);
                let (building, level) = buildings
                    .iter()
                    .find(|(bx, by, _, _)| (*bx, *by) == (x, y))
                    .map(|(_, _, building, level)| (*building, *level))
                    .unwrap_or((BuildingType::None, 1));
                Tile {
                    x,
                    y,
                    building,
                    resource: ResourceType::None,
                    land_value: 1.0,
                    level,
                    variant: 0.0,
                    explored: true,
                }
            })
            .collect();
        World::new(
            Grid::from_tiles(size, tiles).unwrap(),
            stats,
            Balance::default(),
            32,
        )
    }

    fn engine() -> Engine {
        EngineBuilder::new(EngineSettings {
            scenario_name: "hostile-test".into(),
            seed: 11,
        })
        .with_system(HostileSystem::new())
        .build()
    }

    #[test]
    fn adjacent_hostile_holds_position_and_resets_cooldown() {
        let mut world = world_with(5, &[(2, 2, BuildingType::Farm, 1)], CityStats::default());
        let id = world.spawn_hostile(2.3, 2.0, 50.0);
        engine().step(Driver::Hostiles, &mut world).unwrap();
        let hostile = world.hostiles().iter().find(|h| h.id == id).unwrap();
        assert_eq!((hostile.x, hostile.y), (2.3, 2.0));
        assert_eq!(hostile.attack_cooldown, 5);
    }

    #[test]
    fn distant_hostile_steps_per_axis() {
        let mut world = world_with(6, &[(5, 5, BuildingType::Farm, 1)], CityStats::default());
        world.spawn_hostile(0.0, 5.0, 50.0);
        engine().step(Driver::Hostiles, &mut world).unwrap();
        let hostile = &world.hostiles()[0];
        assert!((hostile.x - 0.1).abs() < 1e-9);
        assert_eq!(hostile.y, 5.0, "no movement on an aligned axis");
        assert_eq!(hostile.attack_cooldown, 0);
    }

    #[test]
    fn hostile_without_targets_waits() {
        let mut world = world_with(4, &[(1, 1, BuildingType::Road, 1)], CityStats::default());
        world.spawn_hostile(3.0, 3.0, 50.0);
        engine().step(Driver::Hostiles, &mut world).unwrap();
        assert_eq!((world.hostiles()[0].x, world.hostiles()[0].y), (3.0, 3.0));
    }

    #[test]
    fn defenses_stack_and_remove_the_dead() {
        let mut world = world_with(
            5,
            &[
                (1, 1, BuildingType::Defense, 3),
                (3, 3, BuildingType::Defense, 2),
                (4, 4, BuildingType::Defense, 1),
            ],
            CityStats::default(),
        );
        // 12 + 8 = 20 damage at (2, 2); (4, 4) is out of reach.
        let tough = world.spawn_hostile(2.2, 1.9, 50.0);
        let frail = world.spawn_hostile(2.0, 2.0, 20.0);
        engine().step(Driver::Hostiles, &mut world).unwrap();

        assert_eq!(world.hostiles().len(), 1);
        let survivor = &world.hostiles()[0];
        assert_eq!(survivor.id, tough);
        assert!((survivor.hp - 30.0).abs() < 1e-9);
        assert!(world.hostiles().iter().all(|h| h.id != frail));
        assert!(world
            .events()
            .iter()
            .any(|event| event.message.contains("repelled 1")));
    }

    #[test]
    fn theft_clamps_at_zero() {
        let stats = CityStats {
            money: 4.0,
            food: 50.0,
            ..CityStats::default()
        };
        let mut world = world_with(3, &[(1, 1, BuildingType::Farm, 1)], stats);
        world.balance_mut().hostiles.attack_chance = 1.0;
        world.spawn_hostile(1.0, 1.5, 50.0);
        engine().step(Driver::Hostiles, &mut world).unwrap();
        assert_eq!(world.stats().money, 0.0);
        assert!((world.stats().food - 45.0).abs() < 1e-9);
        assert_eq!(world.hostiles()[0].attack_cooldown, 5);
    }

    #[test]
    fn cooldown_blocks_repeat_attacks() {
        let stats = CityStats {
            money: 100.0,
            ..CityStats::default()
        };
        let mut world = world_with(3, &[(1, 1, BuildingType::Farm, 1)], stats);
        world.balance_mut().hostiles.attack_chance = 1.0;
        world.spawn_hostile(1.0, 1.0, 50.0);
        let mut engine = engine();
        for _ in 0..5 {
            engine.step(Driver::Hostiles, &mut world).unwrap();
        }
        assert!((world.stats().money - 90.0).abs() < 1e-9);
        engine.step(Driver::Hostiles, &mut world).unwrap();
        assert!((world.stats().money - 80.0).abs() < 1e-9);
    }

    #[test]
    fn spawn_respects_population_and_cap() {
        let mut world = world_with(8, &[], CityStats::default());
        let mut engine = engine();
        for _ in 0..50 {
            engine.step(Driver::Hostiles, &mut world).unwrap();
        }
        assert!(world.hostiles().is_empty(), "no population, no raiders");

        world.stats_mut().population = 10_000.0;
        world.stats_mut().era = Era::Modern;
        world.balance_mut().hostiles.max_spawn_chance = 1.0;
        for _ in 0..20 {
            engine.step(Driver::Hostiles, &mut world).unwrap();
        }
        assert_eq!(world.hostiles().len(), 10);
        for hostile in world.hostiles() {
            assert_eq!(hostile.max_hp, 50.0);
            assert!(hostile.x >= 0.0 && hostile.x <= 7.0);
            assert!(hostile.y >= 0.0 && hostile.y <= 7.0);
        }

        world.hostiles_mut().clear();
        world.stats_mut().era = Era::Future;
        engine.step(Driver::Hostiles, &mut world).unwrap();
        assert_eq!(world.hostiles()[0].max_hp, 250.0);
    }

    #[test]
    fn strike_wounds_then_slays() {
        let mut world = world_with(3, &[], CityStats::default());
        let id = world.spawn_hostile(0.0, 0.0, 50.0);
        assert_eq!(strike(&mut world, id), StrikeOutcome::Wounded { hp: 25.0 });
        assert_eq!(strike(&mut world, id), StrikeOutcome::Slain);
        assert!(world.hostiles().is_empty());
        assert_eq!(strike(&mut world, id), StrikeOutcome::Missed);
    }
}
