pub mod buildings;
pub mod engine;
pub mod goals;
pub mod grid;
pub mod oracle;
pub mod rng;
pub mod scenario;
pub mod session;
pub mod systems;
pub mod transactions;
pub mod web;
pub mod world;

pub use engine::{Driver, Engine, EngineBuilder, EngineSettings};
pub use grid::{BuildingType, Grid, ResourceType, Tile};
pub use scenario::{Scenario, ScenarioLoader};
pub use session::{Session, SessionError, SessionHandle};
pub use transactions::{apply_tool, RejectReason, TransactionOutcome};
pub use world::{CityStats, World, WorldSnapshot};
