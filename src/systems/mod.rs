mod economy;
mod explorers;
mod hostiles;

pub use economy::{sweep, EconomySystem, Production};
pub use explorers::ExplorerSystem;
pub use hostiles::{strike, HostileSystem, StrikeOutcome};

use crate::engine::{EngineBuilder, EngineSettings};

/// Builder preloaded with the three periodic drivers.
pub fn standard_engine(settings: EngineSettings) -> EngineBuilder {
    EngineBuilder::new(settings)
        .with_system(EconomySystem::new())
        .with_system(HostileSystem::new())
        .with_system(ExplorerSystem::new())
}
