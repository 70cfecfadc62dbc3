use anyhow::{Context, Result};
use clap::Parser;
use habitat_core::error::SchedulerError;
use habitat_core::metrics::init_logging;
use habitat_lib::{ShutdownManager, Simulation, SimulationConfig};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Number of rounds to simulate
    #[arg(short, long, default_value_t = 9)]
    rounds: usize,

    /// Seed for a reproducible initial layout
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    rows: Option<usize>,

    #[arg(long)]
    columns: Option<usize>,

    /// Initial population
    #[arg(short, long)]
    population: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(seed) = self.seed {
            config.world.seed = Some(seed);
        }
        if let Some(rows) = self.rows {
            config.world.rows = rows;
        }
        if let Some(columns) = self.columns {
            config.world.columns = columns;
        }
        if let Some(population) = self.population {
            config.world.initial_population = population;
        }
    }
}

fn run(args: &Args, shutdown: &ShutdownManager) -> Result<()> {
    let mut config = SimulationConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config))?;
    args.apply(&mut config);

    let mut sim = Simulation::new(config)?;
    sim.start()?;
    let rounds = sim.run_rounds(args.rounds, shutdown)?;
    tracing::info!(rounds, "Run finished, shutting down");

    let report = sim.shutdown()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logging(tracing::Level::INFO);
    let args = Args::parse();

    let shutdown = ShutdownManager::new();
    if let Err(e) = shutdown.install_ctrl_c_handler() {
        tracing::warn!(error = %e, "Running without Ctrl+C handling");
    }

    match run(&args, &shutdown) {
        Ok(()) => ExitCode::from(shutdown.exit_code() as u8),
        Err(e) => {
            if let Some(SchedulerError::ShutdownTimeout(grace)) = e.downcast_ref::<SchedulerError>() {
                eprintln!("Rounds still running {}ms after shutdown", grace.as_millis());
            } else {
                eprintln!("Application error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
