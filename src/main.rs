use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

use frontier::{
    engine::EngineSettings,
    scenario::ScenarioLoader,
    systems,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Frontier settlement simulation")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/frontier.yaml")]
    scenario: PathBuf,

    /// Headless run length in economy days (uses scenario default when omitted)
    #[arg(long)]
    days: Option<u64>,

    /// Run the live session behind the HTTP API instead of a headless run
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Never consult the goal/news oracle
    #[arg(long)]
    no_ai: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&scenario.logging.level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.serve {
        return web::run(WebServerConfig {
            scenario,
            ai_enabled: !cli.no_ai,
            host: cli.host,
            port: cli.port,
        })
        .await;
    }

    let days = scenario.ticks(cli.days);
    let mut world = scenario.build_world();
    let mut engine = systems::standard_engine(EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
    })
    .build();

    engine.run_with_hook(&mut world, days, |world| {
        let stats = world.stats();
        info!(
            day = stats.day,
            era = stats.era.label(),
            population = stats.population,
            money = stats.money,
            raiders = world.hostiles().len(),
            "day complete"
        );
    })?;

    let stats = world.stats();
    println!(
        "Scenario '{}' ran for {} days. Era: {}, population: {:.0}, money: ${:.0}",
        scenario.name,
        days,
        stats.era.label(),
        stats.population,
        stats.money
    );
    Ok(())
}
