use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{
    grid::{BuildingType, Grid},
    transactions::{self, TransactionOutcome},
    world::{CityStats, World},
};

fn default_grid_size() -> usize {
    20
}

fn default_reveal_radius() -> f64 {
    3.0
}

fn default_event_log_capacity() -> usize {
    40
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
    #[serde(default = "default_reveal_radius")]
    pub reveal_radius: f64,
    /// Headless economy ticks when the CLI is not given `--days`.
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
    #[serde(default)]
    pub starting: StartingStock,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub balance: Balance,
    #[serde(default)]
    pub oracle: OracleSettings,
    /// Builds applied as ordinary transactions before the first tick.
    #[serde(default)]
    pub opening: Vec<OpeningBuild>,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct StartingStock {
    pub money: f64,
    pub wood: f64,
    pub stone: f64,
    pub food: f64,
    pub population: f64,
}

impl Default for StartingStock {
    fn default() -> Self {
        Self {
            money: 800.0,
            wood: 120.0,
            stone: 60.0,
            food: 80.0,
            population: 0.0,
        }
    }
}

/// Periods of the three independent drivers, in milliseconds of wall time.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct Schedule {
    pub economy_ms: u64,
    pub hostiles_ms: u64,
    pub explorers_ms: u64,
}

impl Schedule {
    pub fn economy(&self) -> Duration {
        Duration::from_millis(self.economy_ms)
    }

    pub fn hostiles(&self) -> Duration {
        Duration::from_millis(self.hostiles_ms)
    }

    pub fn explorers(&self) -> Duration {
        Duration::from_millis(self.explorers_ms)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            economy_ms: 2_000,
            hostiles_ms: 200,
            explorers_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Balance {
    pub food_consumption_rate: f64,
    pub starvation_penalty: f64,
    pub pop_per_residential: f64,
    pub base_population_cap: f64,
    pub farm_food_per_level: f64,
    pub industry_yield_per_level: f64,
    pub industry_bonus_income: f64,
    pub port_trade_income: f64,
    pub weather_change_chance: f64,
    pub upgrade_cost_multiplier: f64,
    pub demolish_fee: f64,
    pub demolish_forest_wood: f64,
    pub hostiles: HostileBalance,
    pub explorers: ExplorerBalance,
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            food_consumption_rate: 0.2,
            starvation_penalty: 2.0,
            pop_per_residential: 20.0,
            base_population_cap: 0.0,
            farm_food_per_level: 8.0,
            industry_yield_per_level: 3.0,
            industry_bonus_income: 8.0,
            port_trade_income: 20.0,
            weather_change_chance: 0.05,
            upgrade_cost_multiplier: 1.5,
            demolish_fee: 5.0,
            demolish_forest_wood: 10.0,
            hostiles: HostileBalance::default(),
            explorers: ExplorerBalance::default(),
        }
    }
}

impl Balance {
    /// Costs, fees and rewards feed straight into the ledger; none may be
    /// negative.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let hostiles = &self.hostiles;
        let explorers = &self.explorers;
        let non_negative = [
            ("food_consumption_rate", self.food_consumption_rate),
            ("starvation_penalty", self.starvation_penalty),
            ("pop_per_residential", self.pop_per_residential),
            ("base_population_cap", self.base_population_cap),
            ("farm_food_per_level", self.farm_food_per_level),
            ("industry_yield_per_level", self.industry_yield_per_level),
            ("industry_bonus_income", self.industry_bonus_income),
            ("port_trade_income", self.port_trade_income),
            ("demolish_fee", self.demolish_fee),
            ("demolish_forest_wood", self.demolish_forest_wood),
            ("hostiles.base_hp", hostiles.base_hp),
            ("hostiles.speed", hostiles.speed),
            ("hostiles.move_threshold", hostiles.move_threshold),
            ("hostiles.attack_range", hostiles.attack_range),
            ("hostiles.steal_money", hostiles.steal_money),
            ("hostiles.steal_food", hostiles.steal_food),
            ("hostiles.defense_damage_per_level", hostiles.defense_damage_per_level),
            ("hostiles.click_damage", hostiles.click_damage),
            ("explorers.reach", explorers.reach),
            ("explorers.reveal_radius", f64::from(explorers.reveal_radius)),
            ("explorers.wood_reward", explorers.wood_reward),
            ("explorers.stone_reward", explorers.stone_reward),
            ("explorers.money_bonus", explorers.money_bonus),
        ];
        if let Some((field, _)) = non_negative
            .iter()
            .find(|(_, value)| value.is_nan() || *value < 0.0)
        {
            return Err(ScenarioError::NegativeBalance { field: *field });
        }
        let positive = [
            ("hostiles.spawn_population_divisor", hostiles.spawn_population_divisor),
            ("explorers.speed", explorers.speed),
        ];
        if let Some((field, _)) = positive
            .iter()
            .find(|(_, value)| value.is_nan() || *value <= 0.0)
        {
            return Err(ScenarioError::NonPositiveBalance { field: *field });
        }
        if self.upgrade_cost_multiplier.is_nan() || self.upgrade_cost_multiplier < 1.0 {
            return Err(ScenarioError::ShrinkingUpgrades(self.upgrade_cost_multiplier));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostileBalance {
    pub max_count: usize,
    pub max_spawn_chance: f64,
    /// Spawn chance is population / this, capped at `max_spawn_chance`.
    pub spawn_population_divisor: f64,
    pub base_hp: f64,
    pub speed: f64,
    pub move_threshold: f64,
    pub attack_range: f64,
    pub attack_cooldown: u32,
    pub attack_chance: f64,
    pub steal_money: f64,
    pub steal_food: f64,
    pub defense_damage_per_level: f64,
    pub click_damage: f64,
}

impl Default for HostileBalance {
    fn default() -> Self {
        Self {
            max_count: 10,
            max_spawn_chance: 0.3,
            spawn_population_divisor: 500.0,
            base_hp: 50.0,
            speed: 0.1,
            move_threshold: 0.5,
            attack_range: 1.0,
            attack_cooldown: 5,
            attack_chance: 0.3,
            steal_money: 10.0,
            steal_food: 5.0,
            defense_damage_per_level: 4.0,
            click_damage: 25.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplorerBalance {
    pub speed: f64,
    /// Chebyshev distance at which a target counts as reached.
    pub reach: f64,
    pub reveal_radius: i32,
    pub wood_reward: f64,
    pub stone_reward: f64,
    pub money_bonus: f64,
}

impl Default for ExplorerBalance {
    fn default() -> Self {
        Self {
            speed: 0.2,
            reach: 0.5,
            reveal_radius: 1,
            wood_reward: 15.0,
            stone_reward: 15.0,
            money_bonus: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleSettings {
    pub goal_retry_ms: u64,
    pub goal_max_retries: u32,
    /// Ask for a news item every this many economy ticks; 0 disables news.
    pub news_interval_days: u64,
}

impl OracleSettings {
    pub fn goal_retry(&self) -> Duration {
        Duration::from_millis(self.goal_retry_ms)
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            goal_retry_ms: 5_000,
            goal_max_retries: 5,
            news_interval_days: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct OpeningBuild {
    pub x: i32,
    pub y: i32,
    pub tool: BuildingType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("grid size must be between 1 and {max}, got {size}")]
    GridSize { size: usize, max: usize },
    #[error("driver period for {driver} must be greater than zero")]
    ZeroPeriod { driver: &'static str },
    #[error("event log capacity must be greater than zero")]
    EmptyEventLog,
    #[error("starting stock must be non-negative")]
    NegativeStock,
    #[error("balance value {field} must be non-negative")]
    NegativeBalance { field: &'static str },
    #[error("balance value {field} must be greater than zero")]
    NonPositiveBalance { field: &'static str },
    #[error("upgrade cost multiplier must be at least 1, got {0}")]
    ShrinkingUpgrades(f64),
    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub const MAX_GRID_SIZE: usize = 64;

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .map_err(|source| ScenarioError::Io {
                path: path.clone(),
                source,
            })
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Scenario::from_yaml(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(text).map_err(ScenarioError::Yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE {
            return Err(ScenarioError::GridSize {
                size: self.grid_size,
                max: MAX_GRID_SIZE,
            });
        }
        let periods = [
            ("economy", self.schedule.economy_ms),
            ("hostiles", self.schedule.hostiles_ms),
            ("explorers", self.schedule.explorers_ms),
        ];
        if let Some((driver, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(ScenarioError::ZeroPeriod { driver: *driver });
        }
        if self.event_log_capacity == 0 {
            return Err(ScenarioError::EmptyEventLog);
        }
        let stock = &self.starting;
        if [stock.money, stock.wood, stock.stone, stock.food, stock.population]
            .iter()
            .any(|value| *value < 0.0)
        {
            return Err(ScenarioError::NegativeStock);
        }
        self.balance.validate()
    }

    pub fn build_world(&self) -> World {
        let grid = Grid::generate_with_reveal(self.grid_size, self.seed, self.reveal_radius);
        let stats = CityStats {
            money: self.starting.money,
            wood: self.starting.wood,
            stone: self.starting.stone,
            food: self.starting.food,
            population: self.starting.population,
            ..CityStats::default()
        };
        let mut world = World::new(grid, stats, self.balance.clone(), self.event_log_capacity);
        for build in &self.opening {
            let outcome = transactions::apply_tool(&mut world, build.x, build.y, build.tool);
            if let TransactionOutcome::Rejected { reason } = outcome {
                warn!(x = build.x, y = build.y, tool = ?build.tool, %reason, "opening build rejected");
            }
        }
        world
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "name: cove\nseed: 4\n";

    #[test]
    fn minimal_scenario_takes_defaults() {
        let scenario = Scenario::from_yaml(MINIMAL).unwrap();
        assert_eq!(scenario.grid_size, 20);
        assert_eq!(scenario.schedule.economy_ms, 2_000);
        assert_eq!(scenario.balance.hostiles.max_count, 10);
        assert_eq!(scenario.oracle.goal_max_retries, 5);
        assert_eq!(scenario.logging.level, "info");
        assert_eq!(scenario.ticks(None), 60);
        assert_eq!(scenario.ticks(Some(3)), 3);
    }

    #[test]
    fn partial_balance_keeps_other_defaults() {
        let text = "name: cove\nseed: 4\nbalance:\n  demolish_fee: 9\n  hostiles:\n    speed: 0.5\n";
        let scenario = Scenario::from_yaml(text).unwrap();
        assert!((scenario.balance.demolish_fee - 9.0).abs() < f64::EPSILON);
        assert!((scenario.balance.hostiles.speed - 0.5).abs() < f64::EPSILON);
        assert_eq!(scenario.balance.hostiles.attack_cooldown, 5);
        assert!((scenario.balance.food_consumption_rate - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_period_is_rejected() {
        let text = "name: cove\nseed: 4\nschedule:\n  hostiles_ms: 0\n";
        let err = Scenario::from_yaml(text).unwrap_err();
        assert!(err.to_string().contains("hostiles"));
    }

    #[test]
    fn balance_values_that_mint_resources_are_rejected() {
        let fee = "name: cove\nseed: 4\nbalance:\n  demolish_fee: -5\n";
        let err = Scenario::from_yaml(fee).unwrap_err();
        assert!(err.to_string().contains("demolish_fee"), "{err}");

        let multiplier = "name: cove\nseed: 4\nbalance:\n  upgrade_cost_multiplier: -1.5\n";
        assert!(matches!(err_of(multiplier), ScenarioError::ShrinkingUpgrades(_)));

        let radius = "name: cove\nseed: 4\nbalance:\n  explorers:\n    reveal_radius: -1\n";
        assert!(matches!(
            err_of(radius),
            ScenarioError::NegativeBalance {
                field: "explorers.reveal_radius"
            }
        ));

        let stalled = "name: cove\nseed: 4\nbalance:\n  explorers:\n    speed: 0\n";
        assert!(matches!(
            err_of(stalled),
            ScenarioError::NonPositiveBalance {
                field: "explorers.speed"
            }
        ));
    }

    #[test]
    fn yaml_errors_keep_their_type() {
        assert!(matches!(err_of("name: [oops\n"), ScenarioError::Yaml(_)));
    }

    fn err_of(text: &str) -> ScenarioError {
        Scenario::from_yaml(text)
            .unwrap_err()
            .downcast::<ScenarioError>()
            .unwrap()
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let text = "name: cove\nseed: 4\ngrid_size: 500\n";
        assert!(Scenario::from_yaml(text).is_err());
    }
}
