use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fit_tracker::clock::{Clock, SystemClock};
use fit_tracker::stats::format_duration;
use fit_tracker::store::JsonFileStore;
use fit_tracker::transfer::{export_file_name, to_json};
use fit_tracker::{SessionEngine, TrackerConfig};

#[derive(Parser)]
#[command(name = "fit-tracker", about = "Inspect and move workout history")]
struct Cli {
    /// JSON config file
    #[arg(long, default_value = "fit-tracker.json")]
    config: PathBuf,
    /// Overrides the state file from the config
    #[arg(long)]
    state: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Total workouts, total volume and current streak
    Stats,
    /// The most recent workouts
    History,
    /// Write history to an export document
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace history with the one in an export document
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = TrackerConfig::load(&cli.config);
    let state_path = cli.state.unwrap_or_else(|| config.state_path.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut engine =
        SessionEngine::open(JsonFileStore::new(&state_path), clock.clone(), &config).await;

    match cli.command {
        Command::Stats => {
            let stats = engine.stats();
            println!("Workouts: {}", stats.total_workouts);
            println!("Total volume: {}kg", stats.total_volume);
            println!("Current streak: {} days", stats.current_streak);
            if let Some(elapsed) = engine.elapsed_seconds() {
                println!("In progress: {}", format_duration(elapsed));
            }
        }
        Command::History => {
            let recent = engine.recent();
            if recent.is_empty() {
                println!("No workouts yet. Start your first one!");
            }
            for summary in recent {
                println!(
                    "{}  {} exercises • {} • {}kg",
                    summary.date.format("%a %b %e"),
                    summary.exercise_count,
                    summary.duration,
                    summary.total_volume
                );
            }
        }
        Command::Export { out } => {
            let path = out.unwrap_or_else(|| PathBuf::from(export_file_name(clock.today())));
            let json = to_json(&engine.export()).context("encoding export")?;
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("exported history to {}", path.display());
        }
        Command::Import { path } => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let count = engine
                .import_history(&raw)
                .await
                .with_context(|| format!("importing {}", path.display()))?;
            println!("Imported {} workouts", count);
        }
    }
    Ok(())
}
