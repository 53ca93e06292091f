use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    buildings::Cost,
    goals::Goal,
    grid::{BuildingType, Grid},
    scenario::Balance,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Era {
    Primitive,
    Industrial,
    Modern,
    Future,
}

impl Era {
    pub fn next(self) -> Option<Era> {
        match self {
            Era::Primitive => Some(Era::Industrial),
            Era::Industrial => Some(Era::Modern),
            Era::Modern => Some(Era::Future),
            Era::Future => None,
        }
    }

    /// (population, money) both required to enter this era.
    pub fn threshold(self) -> (f64, f64) {
        match self {
            Era::Primitive => (0.0, 0.0),
            Era::Industrial => (50.0, 2_000.0),
            Era::Modern => (200.0, 10_000.0),
            Era::Future => (600.0, 40_000.0),
        }
    }

    pub fn hostile_hp_bonus(self) -> f64 {
        match self {
            Era::Future => 200.0,
            _ => 0.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Era::Primitive => "Primitive",
            Era::Industrial => "Industrial",
            Era::Modern => "Modern",
            Era::Future => "Future",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Sunny,
    Rain,
    Snow,
}

impl Weather {
    pub const ALL: [Weather; 3] = [Weather::Sunny, Weather::Rain, Weather::Snow];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityStats {
    pub money: f64,
    pub wood: f64,
    pub stone: f64,
    pub food: f64,
    pub population: f64,
    pub day: u64,
    pub era: Era,
    pub weather: Weather,
}

impl Default for CityStats {
    fn default() -> Self {
        Self {
            money: 0.0,
            wood: 0.0,
            stone: 0.0,
            food: 0.0,
            population: 0.0,
            day: 0,
            era: Era::Primitive,
            weather: Weather::Sunny,
        }
    }
}

impl CityStats {
    pub fn can_afford(&self, cost: &Cost) -> bool {
        self.money >= cost.money && self.wood >= cost.wood && self.stone >= cost.stone
    }

    /// The ledger after paying `cost`, or `None` if any counter would go
    /// negative. `self` is never touched.
    pub fn debited(&self, cost: &Cost) -> Option<CityStats> {
        if !self.can_afford(cost) {
            return None;
        }
        let mut next = self.clone();
        next.money -= cost.money;
        next.wood -= cost.wood;
        next.stone -= cost.stone;
        Some(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostileAgent {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub hp: f64,
    pub max_hp: f64,
    pub attack_cooldown: u32,
}

impl HostileAgent {
    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorerState {
    Idle,
    Exploring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerAgent {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub target: Option<(i32, i32)>,
    pub state: ExplorerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Danger,
    News,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub seq: u64,
    pub day: u64,
    pub kind: EventKind,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only ring of recent events; the oldest entry is dropped once the
/// capacity is reached.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<GameEvent>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, day: u64, kind: EventKind, message: impl Into<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(GameEvent {
            seq,
            day,
            kind,
            message: message.into(),
            recorded_at: Utc::now(),
        });
        seq
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.entries.iter()
    }

    /// Entries with a sequence number at or after `seq`.
    pub fn since(&self, seq: u64) -> impl Iterator<Item = &GameEvent> {
        self.entries.iter().filter(move |event| event.seq >= seq)
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Building counts from the most recent economy sweep.
pub type BuildingCensus = BTreeMap<BuildingType, u32>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub grid: Grid,
    pub stats: CityStats,
    pub hostiles: Vec<HostileAgent>,
    pub explorers: Vec<ExplorerAgent>,
    pub goal: Option<Goal>,
    pub census: BuildingCensus,
    pub events: Vec<GameEvent>,
}

pub struct World {
    pub(crate) grid: Grid,
    pub(crate) stats: CityStats,
    pub(crate) hostiles: Vec<HostileAgent>,
    pub(crate) explorers: Vec<ExplorerAgent>,
    pub(crate) goal: Option<Goal>,
    pub(crate) census: BuildingCensus,
    pub(crate) events: EventLog,
    pub(crate) balance: Balance,
    next_agent: u64,
}

impl World {
    pub fn new(grid: Grid, stats: CityStats, balance: Balance, event_capacity: usize) -> Self {
        Self {
            grid,
            stats,
            hostiles: Vec::new(),
            explorers: Vec::new(),
            goal: None,
            census: BuildingCensus::new(),
            events: EventLog::new(event_capacity),
            balance,
            next_agent: 0,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Swaps in a whole grid. Intended for setup; commands go through
    /// [`crate::transactions::apply_tool`].
    pub fn set_grid(&mut self, grid: Grid) {
        self.grid = grid;
    }

    pub fn stats(&self) -> &CityStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CityStats {
        &mut self.stats
    }

    pub fn balance_mut(&mut self) -> &mut Balance {
        &mut self.balance
    }

    pub fn hostiles(&self) -> &[HostileAgent] {
        &self.hostiles
    }

    pub fn hostiles_mut(&mut self) -> &mut Vec<HostileAgent> {
        &mut self.hostiles
    }

    pub fn explorers(&self) -> &[ExplorerAgent] {
        &self.explorers
    }

    pub fn explorers_mut(&mut self) -> &mut Vec<ExplorerAgent> {
        &mut self.explorers
    }

    pub fn goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    pub fn set_goal(&mut self, goal: Option<Goal>) {
        self.goal = goal;
    }

    pub fn census(&self) -> &BuildingCensus {
        &self.census
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn record(&mut self, kind: EventKind, message: impl Into<String>) -> u64 {
        self.events.push(self.stats.day, kind, message)
    }

    pub fn spawn_hostile(&mut self, x: f64, y: f64, hp: f64) -> u64 {
        let id = self.allocate();
        self.hostiles.push(HostileAgent {
            id,
            x,
            y,
            hp,
            max_hp: hp,
            attack_cooldown: 0,
        });
        id
    }

    pub fn spawn_explorer(&mut self, x: f64, y: f64) -> u64 {
        let id = self.allocate();
        self.explorers.push(ExplorerAgent {
            id,
            x,
            y,
            target: None,
            state: ExplorerState::Idle,
        });
        id
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            grid: self.grid.clone(),
            stats: self.stats.clone(),
            hostiles: self.hostiles.clone(),
            explorers: self.explorers.clone(),
            goal: self.goal.clone(),
            census: self.census.clone(),
            events: self.events.iter().cloned().collect(),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_agent;
        self.next_agent += 1;
        id
    }
}
