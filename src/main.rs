use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hamlet::{
    engine::{EngineBuilder, EngineSettings, GameSpeed},
    events::TracingPresenter,
    scenario::ScenarioLoader,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Headless village simulation runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/starter_village.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Game speed multiplier applied to every tick
    #[arg(long, value_enum, default_value_t = GameSpeed::Normal)]
    speed: GameSpeed,

    /// Override snapshot interval in ticks (0 disables snapshots)
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the simulation and serve its frames over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    init_tracing(&scenario.config.logging.level);

    let ticks = scenario.ticks(cli.ticks);
    let snapshot_interval = cli
        .snapshot_interval
        .unwrap_or(scenario.snapshot_interval_ticks);
    let snapshot_dir = cli
        .snapshot_dir
        .unwrap_or_else(|| PathBuf::from("snapshots"));

    if let Some(Command::Serve { host, port }) = cli.command {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start the async runtime")?;
        return runtime.block_on(web::run(WebServerConfig {
            scenario,
            ticks,
            speed: cli.speed,
            snapshot_interval,
            snapshot_dir,
            host,
            port,
        }));
    }

    let mut world = scenario.build_world()?;
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        snapshot_interval_ticks: snapshot_interval,
        snapshot_dir,
        speed: cli.speed,
    };
    let mut engine = EngineBuilder::new(settings)
        .with_standard_systems()
        .with_presenter(TracingPresenter)
        .build();

    engine.run(&mut world, ticks)?;

    let ledger = &world.ledger;
    println!(
        "Scenario '{}' ran {} ticks ({:.1} game units). Day {} of {}. Population {}/{}, food {:.1}, wood {:.1}, money {:.1}",
        scenario.name,
        world.tick(),
        world.elapsed(),
        world.calendar.day,
        world.calendar.season,
        ledger.population,
        ledger.population_cap,
        ledger.food,
        ledger.wood,
        ledger.money,
    );
    Ok(())
}
