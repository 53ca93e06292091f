use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    rng::{RngManager, SystemRng},
    world::World,
};

/// The three independently scheduled periodic drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    Economy,
    Hostiles,
    Explorers,
}

impl Driver {
    pub const ALL: [Driver; 3] = [Driver::Economy, Driver::Hostiles, Driver::Explorers];
}

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            ticks: HashMap::new(),
            settings: self.settings,
        }
    }
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    ticks: HashMap<Driver, u64>,
    settings: EngineSettings,
}

impl Engine {
    /// Runs one tick of every system registered for `driver`, to completion.
    pub fn step(&mut self, driver: Driver, world: &mut World) -> Result<()> {
        let tick = {
            let counter = self.ticks.entry(driver).or_insert(0);
            *counter += 1;
            *counter
        };
        let mut ran = false;
        for system in self.systems.iter_mut().filter(|s| s.driver() == driver) {
            let mut rng_stream = self.rng.stream(system.name());
            let ctx = SystemContext {
                tick,
                scenario_name: &self.settings.scenario_name,
            };
            trace!(system = system.name(), tick, "system tick");
            system.run(&ctx, world, &mut rng_stream)?;
            ran = true;
        }
        if ran {
            Ok(())
        } else {
            Err(anyhow!("no system registered for {driver:?}"))
        }
    }

    /// Headless run: each iteration steps every driver once in
    /// economy, hostiles, explorers order.
    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<()> {
        self.run_with_hook(world, ticks, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(&World),
    {
        for _ in 0..ticks {
            for driver in Driver::ALL {
                if self.has_driver(driver) {
                    self.step(driver, world)?;
                }
            }
            hook(world);
        }
        Ok(())
    }

    pub fn has_driver(&self, driver: Driver) -> bool {
        self.systems.iter().any(|s| s.driver() == driver)
    }

    pub fn ticks(&self, driver: Driver) -> u64 {
        self.ticks.get(&driver).copied().unwrap_or(0)
    }
}

pub struct SystemContext<'a> {
    /// Per-driver tick counter, starting at 1.
    pub tick: u64,
    pub scenario_name: &'a str,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn driver(&self) -> Driver;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
