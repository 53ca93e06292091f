use anyhow::Result;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    buildings,
    engine::{Driver, System, SystemContext},
    goals,
    grid::{BuildingType, ResourceType},
    rng::SystemRng,
    world::{BuildingCensus, EventKind, Weather, World},
};

/// What one sweep over the grid produced, before consumption.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Production {
    pub income: f64,
    pub growth: f64,
    pub food: f64,
    pub wood: f64,
    pub stone: f64,
    pub census: BuildingCensus,
}

/// Sweeps every tile once. Roads are counted but yield nothing.
pub fn sweep(world: &World) -> Production {
    let balance = &world.balance;
    let mut out = Production::default();
    for tile in world.grid.tiles() {
        let Some(def) = buildings::definition(tile.building) else {
            continue;
        };
        let level = f64::from(tile.level);
        let scale = level * tile.land_value;
        out.income += def.income * scale;
        out.growth += def.population * scale;
        *out.census.entry(tile.building).or_insert(0) += 1;

        match tile.building {
            BuildingType::Farm => out.food += balance.farm_food_per_level * level,
            BuildingType::Industrial => match tile.resource {
                ResourceType::Forest => out.wood += balance.industry_yield_per_level * level,
                ResourceType::Stone => out.stone += balance.industry_yield_per_level * level,
                _ => out.income += balance.industry_bonus_income * scale,
            },
            BuildingType::Port => out.income += balance.port_trade_income,
            _ => {}
        }
    }
    out
}

pub struct EconomySystem;

impl EconomySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EconomySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EconomySystem {
    fn name(&self) -> &str {
        "economy"
    }

    fn driver(&self) -> Driver {
        Driver::Economy
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let production = sweep(world);
        let balance = world.balance.clone();
        let residential = production
            .census
            .get(&BuildingType::Residential)
            .copied()
            .unwrap_or(0);

        let stats = &mut world.stats;
        stats.money += production.income;
        stats.wood += production.wood;
        stats.stone += production.stone;

        let consumption = (stats.population * balance.food_consumption_rate).ceil();
        let food_after = stats.food + production.food - consumption;
        let starving = food_after < 0.0;
        if starving {
            stats.food = 0.0;
            stats.population = (stats.population - balance.starvation_penalty).max(0.0);
        } else {
            stats.food = food_after;
            stats.population += production.growth;
        }
        let cap = f64::from(residential) * balance.pop_per_residential
            + balance.base_population_cap;
        stats.population = stats.population.min(cap).max(0.0);
        stats.day += 1;

        let mut advanced = None;
        if let Some(next) = stats.era.next() {
            let (pop_needed, money_needed) = next.threshold();
            if stats.population >= pop_needed && stats.money >= money_needed {
                stats.era = next;
                advanced = Some(next);
            }
        }

        if rng.chance(balance.weather_change_chance) {
            stats.weather = Weather::ALL[rng.gen_range(0..Weather::ALL.len())];
        }

        debug!(
            day = stats.day,
            money = stats.money,
            population = stats.population,
            food = stats.food,
            starving,
            "economy tick"
        );

        world.census = production.census;

        if starving {
            world.record(
                EventKind::Danger,
                "Food stores are empty and people are leaving",
            );
        }
        if let Some(era) = advanced {
            info!(era = era.label(), day = world.stats.day, "era advanced");
            world.record(
                EventKind::Success,
                format!("The settlement enters the {} era", era.label()),
            );
        }

        goals::evaluate(world);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{EngineBuilder, EngineSettings},
        goals::{Goal, GoalTarget},
        grid::{Grid, Tile},
        scenario::Balance,
        world::{CityStats, Era},
    };

    fn tile(x: i32, y: i32, building: BuildingType, resource: ResourceType) -> Tile {
        Tile {
            x,
            y,
            building,
            resource,
            land_value: 1.0,
            level: 1,
            variant: 0.0,
            explored: true,
        }
    }

    fn world_from(size: usize, tiles: Vec<Tile>, stats: CityStats) -> World {
        World::new(
            Grid::from_tiles(size, tiles).unwrap(),
            stats,
            Balance::default(),
            16,
        )
    }

    fn tick(world: &mut World) {
        let mut engine = EngineBuilder::new(EngineSettings {
            scenario_name: "economy-test".into(),
            seed: 3,
        })
        .with_system(EconomySystem::new())
        .build();
        engine.step(Driver::Economy, world).unwrap();
    }

    #[test]
    fn single_residential_grows_by_five() {
        let tiles = vec![tile(0, 0, BuildingType::Residential, ResourceType::None)];
        let mut world = world_from(1, tiles, CityStats::default());
        tick(&mut world);
        assert!((world.stats().population - 5.0).abs() < 1e-9);
        assert!((world.stats().money - 1.0).abs() < 1e-9);
        assert_eq!(world.stats().day, 1);
        assert_eq!(world.census().get(&BuildingType::Residential), Some(&1));
    }

    #[test]
    fn industry_yield_depends_on_resource() {
        let tiles = vec![
            tile(0, 0, BuildingType::Industrial, ResourceType::Forest),
            tile(1, 0, BuildingType::Industrial, ResourceType::Stone),
            tile(0, 1, BuildingType::Industrial, ResourceType::None),
            tile(1, 1, BuildingType::Farm, ResourceType::None),
        ];
        let world = world_from(2, tiles, CityStats::default());
        let production = sweep(&world);
        assert!((production.wood - 3.0).abs() < 1e-9);
        assert!((production.stone - 3.0).abs() < 1e-9);
        assert!((production.food - 8.0).abs() < 1e-9);
        // Only the resourceless plant earns money, scaled by its land value.
        let plain = world.grid().get(0, 1).unwrap().land_value;
        assert!((production.income - 8.0 * plain).abs() < 1e-9);
        assert_eq!(production.census.get(&BuildingType::Industrial), Some(&3));
    }

    #[test]
    fn roads_count_but_yield_nothing() {
        let tiles = vec![tile(0, 0, BuildingType::Road, ResourceType::None)];
        let mut world = world_from(1, tiles, CityStats::default());
        let production = sweep(&world);
        assert_eq!(production.income, 0.0);
        assert_eq!(production.growth, 0.0);
        assert_eq!(production.census.get(&BuildingType::Road), Some(&1));

        world.set_goal(Some(Goal {
            description: "lay a road".into(),
            target_type: GoalTarget::BuildingCount,
            target_value: 1.0,
            building_type: Some(BuildingType::Road),
            resource: None,
            reward: 20.0,
            completed: false,
        }));
        tick(&mut world);
        assert_eq!(world.census().get(&BuildingType::Road), Some(&1));
        assert!(world.goal().unwrap().completed);
    }

    #[test]
    fn starvation_replaces_growth() {
        let tiles = vec![tile(0, 0, BuildingType::Residential, ResourceType::None)];
        let stats = CityStats {
            population: 10.0,
            food: 1.0,
            ..CityStats::default()
        };
        let mut world = world_from(1, tiles, stats);
        tick(&mut world);
        assert_eq!(world.stats().food, 0.0);
        assert!((world.stats().population - 8.0).abs() < 1e-9);
        assert!(world
            .events()
            .iter()
            .any(|event| event.kind == EventKind::Danger));
    }

    #[test]
    fn population_is_capped_by_housing() {
        let tiles = vec![tile(0, 0, BuildingType::Farm, ResourceType::None)];
        let stats = CityStats {
            population: 30.0,
            food: 100.0,
            ..CityStats::default()
        };
        let mut world = world_from(1, tiles, stats);
        tick(&mut world);
        assert_eq!(world.stats().population, 0.0);
    }

    #[test]
    fn era_advances_one_step_per_tick() {
        let tiles = vec![tile(0, 0, BuildingType::Residential, ResourceType::None)];
        let stats = CityStats {
            population: 700.0,
            money: 100_000.0,
            food: 1_000.0,
            ..CityStats::default()
        };
        let mut world = world_from(1, tiles, stats);
        world.balance_mut().pop_per_residential = 1_000.0;
        tick(&mut world);
        assert_eq!(world.stats().era, Era::Industrial);
        tick(&mut world);
        assert_eq!(world.stats().era, Era::Modern);
        tick(&mut world);
        assert_eq!(world.stats().era, Era::Future);
        tick(&mut world);
        assert_eq!(world.stats().era, Era::Future);
    }

    #[test]
    fn era_needs_both_thresholds() {
        let tiles = vec![tile(0, 0, BuildingType::Residential, ResourceType::None)];
        let stats = CityStats {
            population: 20.0,
            money: 1_000_000.0,
            food: 100.0,
            ..CityStats::default()
        };
        let mut world = world_from(1, tiles, stats);
        tick(&mut world);
        assert_eq!(world.stats().era, Era::Primitive);
    }

    #[test]
    fn goal_is_evaluated_after_stats() {
        let tiles = vec![tile(0, 0, BuildingType::Residential, ResourceType::None)];
        let mut world = world_from(1, tiles, CityStats::default());
        world.set_goal(Some(Goal {
            description: "house five".into(),
            target_type: GoalTarget::Population,
            target_value: 5.0,
            building_type: None,
            resource: None,
            reward: 50.0,
            completed: false,
        }));
        tick(&mut world);
        assert!(world.goal().unwrap().completed);
    }
}
