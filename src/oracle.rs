//! Goal and news sources.
//!
//! The session treats an oracle as slow and unreliable: calls run off the
//! simulation task and `None` means "nothing this time".

use std::sync::Mutex;

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{
    goals::{Goal, GoalTarget, Stockpile},
    grid::{BuildingType, Grid},
    world::{CityStats, Era, Weather},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsKind {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub headline: String,
    pub kind: NewsKind,
}

pub trait Oracle: Send + Sync {
    fn request_goal(&self, stats: &CityStats, grid: &Grid) -> Option<Goal>;
    fn request_news(&self, stats: &CityStats) -> Option<NewsEvent>;
}

/// Never has anything to say.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOracle;

impl Oracle for NullOracle {
    fn request_goal(&self, _stats: &CityStats, _grid: &Grid) -> Option<Goal> {
        None
    }

    fn request_news(&self, _stats: &CityStats) -> Option<NewsEvent> {
        None
    }
}

const GOAL_BUILDINGS: [BuildingType; 6] = [
    BuildingType::Residential,
    BuildingType::Farm,
    BuildingType::Commercial,
    BuildingType::Industrial,
    BuildingType::Park,
    BuildingType::Defense,
];

const POPULATION_GOALS: &[&str] = &[
    "Grow the settlement to {target} residents",
    "Make room for {target} settlers",
];

const MONEY_GOALS: &[&str] = &[
    "Fill the treasury with ${target}",
    "Save up ${target} for hard times",
];

const BUILDING_GOALS: &[&str] = &[
    "Have {target} {building} buildings standing",
    "Expand to {target} {building} plots",
];

const STOCKPILE_GOALS: &[&str] = &[
    "Stockpile {target} {resource}",
    "Put away {target} {resource} for winter",
];

/// Local goal and headline generator. Targets scale from the current ledger so
/// a fresh goal is always ahead of the player.
pub struct TemplateOracle {
    rng: Mutex<ChaCha8Rng>,
}

impl TemplateOracle {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl Oracle for TemplateOracle {
    fn request_goal(&self, stats: &CityStats, grid: &Grid) -> Option<Goal> {
        let mut rng = self.rng.lock().ok()?;
        let target_type = *[
            GoalTarget::Population,
            GoalTarget::Money,
            GoalTarget::BuildingCount,
            GoalTarget::ResourceStockpile,
        ]
        .choose(&mut *rng)?;

        let goal = match target_type {
            GoalTarget::Population => {
                let target = round_up_to(stats.population * 1.5 + 10.0, 5.0);
                Goal {
                    description: fill(pick(&mut rng, POPULATION_GOALS)?, target, "", ""),
                    target_type,
                    target_value: target,
                    building_type: None,
                    resource: None,
                    reward: target * 8.0,
                    completed: false,
                }
            }
            GoalTarget::Money => {
                let target = round_up_to(stats.money * 1.5 + 500.0, 100.0);
                Goal {
                    description: fill(pick(&mut rng, MONEY_GOALS)?, target, "", ""),
                    target_type,
                    target_value: target,
                    building_type: None,
                    resource: None,
                    reward: (target * 0.1).round(),
                    completed: false,
                }
            }
            GoalTarget::BuildingCount => {
                let building = *GOAL_BUILDINGS.choose(&mut *rng)?;
                let extra = rng.gen_range(1..=3);
                let target = (grid.count_buildings(building) + extra) as f64;
                Goal {
                    description: fill(
                        pick(&mut rng, BUILDING_GOALS)?,
                        target,
                        building.label(),
                        "",
                    ),
                    target_type,
                    target_value: target,
                    building_type: Some(building),
                    resource: None,
                    reward: 150.0 * extra as f64,
                    completed: false,
                }
            }
            GoalTarget::ResourceStockpile => {
                let (resource, have, label) = *[
                    (Stockpile::Wood, stats.wood, "wood"),
                    (Stockpile::Stone, stats.stone, "stone"),
                    (Stockpile::Food, stats.food, "food"),
                ]
                .choose(&mut *rng)?;
                let target = round_up_to(have + 50.0, 10.0);
                Goal {
                    description: fill(pick(&mut rng, STOCKPILE_GOALS)?, target, "", label),
                    target_type,
                    target_value: target,
                    building_type: None,
                    resource: Some(resource),
                    reward: 120.0,
                    completed: false,
                }
            }
        };
        Some(goal)
    }

    fn request_news(&self, stats: &CityStats) -> Option<NewsEvent> {
        let mut rng = self.rng.lock().ok()?;
        let mut pool: Vec<(&str, NewsKind)> = Vec::new();

        let appetite = (stats.population * 0.2).ceil() * 3.0;
        if stats.population > 0.0 && stats.food < appetite {
            pool.push((
                "Granaries run low as mouths outnumber harvests",
                NewsKind::Negative,
            ));
        }
        if stats.money > 1_000.0 {
            pool.push((
                "Merchants praise the settlement's full coffers",
                NewsKind::Positive,
            ));
        }
        pool.push(match stats.weather {
            Weather::Rain => ("Steady rain swells the rivers", NewsKind::Neutral),
            Weather::Snow => ("Snow blankets the rooftops overnight", NewsKind::Neutral),
            Weather::Sunny => ("Clear skies bring travellers to the roads", NewsKind::Positive),
        });
        let era_line = match stats.era {
            Era::Primitive => "Elders tell stories of the old coast by firelight",
            Era::Industrial => "Smoke from the new workshops hangs over the bay",
            Era::Modern => "Streetlights now stay on past midnight",
            Era::Future => "Drones hum over the harbour at dawn",
        };
        pool.push((era_line, NewsKind::Neutral));
        if stats.wood < 20.0 {
            pool.push(("Carpenters complain of a timber shortage", NewsKind::Negative));
        }

        let (headline, kind) = *pool.choose(&mut *rng)?;
        Some(NewsEvent {
            headline: format!("Day {}: {headline}", stats.day),
            kind,
        })
    }
}

fn pick<'a>(rng: &mut ChaCha8Rng, templates: &[&'a str]) -> Option<&'a str> {
    templates.choose(rng).copied()
}

fn fill(template: &str, target: f64, building: &str, resource: &str) -> String {
    template
        .replace("{target}", &format!("{target:.0}"))
        .replace("{building}", building)
        .replace("{resource}", resource)
}

fn round_up_to(value: f64, step: f64) -> f64 {
    ((value / step).ceil() * step).max(step)
}
