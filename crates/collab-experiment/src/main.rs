//! Collaborative Design Experiment CLI.
//!
//! Commands:
//! - generate: Generate a session from a JSON plan
//! - report: Replay a server log onto a session and print per-task results
//! - simulate: Generate one task and solve it with a random walk

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use collab_experiment::behavior::{RandomWalk, RandomWalkConfig};
use collab_experiment::postprocess::replay;
use collab_experiment::results::{format_duration, render_table, save_report, session_report};
use collab_experiment::session::{Session, SessionPlan};
use collab_kernel::{CouplingMode, DesignerId, GeneratorConfig, LinearTaskGenerator, Partition};

/// Generate a timestamped output path from the given path.
/// e.g., "report.json" -> "report-20260108-010530.json"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("report");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

#[derive(Parser)]
#[command(name = "collab-experiment")]
#[command(version)]
#[command(about = "Collaborative design experiments")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a session from a plan
    Generate {
        /// Session plan (JSON)
        #[arg(long)]
        plan: PathBuf,

        /// Output file for the generated session
        #[arg(long, default_value = "session.json")]
        output: PathBuf,

        /// Random seed (overrides the plan's seed)
        #[arg(long, env = "COLLAB_SEED")]
        seed: Option<u64>,
    },

    /// Replay a server log and report per-task results
    Report {
        /// Session the log was recorded against (JSON)
        #[arg(long)]
        session: PathBuf,

        /// Server log, one `time;message;json` event per line
        #[arg(long)]
        log: PathBuf,

        /// Also write the report as JSON (a timestamp is added to the name)
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Solve one generated task with a random walk
    Simulate {
        /// Task size N
        #[arg(long, default_value = "4")]
        size: usize,

        /// Designer ids (comma-separated)
        #[arg(long, default_value = "0,1", value_delimiter = ',')]
        designers: Vec<DesignerId>,

        /// Use a signed diagonal coupling instead of a dense one
        #[arg(long)]
        uncoupled: bool,

        /// Error tolerance for a solved task
        #[arg(long, default_value = "0.05")]
        error_tol: f64,

        /// Step budget for the walk
        #[arg(long, default_value = "1000000")]
        max_steps: usize,

        /// Random seed
        #[arg(long, env = "COLLAB_SEED")]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Generate { plan, output, seed } => {
            let mut plan = SessionPlan::load(&plan)?;
            if seed.is_some() {
                plan.seed = seed;
            }

            info!(
                name = %plan.name,
                training = plan.training.len(),
                rounds = plan.rounds.len(),
                seed = ?plan.seed,
                "Generating session"
            );
            let session = Session::generate(&plan)?;
            session.save(&output)?;
            info!(path = %output.display(), "Session saved");
        }

        Commands::Report { session, log, json } => {
            let mut session = Session::load(&session)?;
            let log = std::fs::read_to_string(&log)
                .with_context(|| format!("reading log {}", log.display()))?;

            let stats = replay(&mut session, &log);
            info!(
                lines = stats.lines,
                rounds = stats.rounds,
                actions = stats.actions,
                completions = stats.completions,
                skipped = stats.skipped,
                "Log replayed"
            );

            let reports = session_report(&session);
            print!("{}", render_table(&session.name, &reports));

            if let Some(path) = json {
                let path = timestamped_path(&path);
                save_report(&reports, &path)?;
                info!(path = %path.display(), "Report saved");
            }
        }

        Commands::Simulate {
            size,
            designers,
            uncoupled,
            error_tol,
            max_steps,
            seed,
        } => {
            if error_tol.is_nan() || error_tol <= 0.0 {
                bail!("error tolerance must be positive, got {error_tol}");
            }
            let mut rng: Box<dyn RngCore> = match seed {
                Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed)),
                None => Box::new(rand::rng()),
            };

            let config = GeneratorConfig {
                coupling: CouplingMode::from_coupled(!uncoupled),
                ..Default::default()
            };
            let generator = LinearTaskGenerator::new(config);
            let mut task =
                generator.generate_with_rng(&designers, size, &Partition::default(), &mut rng)?;
            task.start(now_ms())?;

            info!(
                size = size,
                designers = ?designers,
                coupled = !uncoupled,
                "Running random walk"
            );
            let walk = RandomWalk::new(RandomWalkConfig {
                max_steps,
                ..Default::default()
            });
            let outcome = walk.run(&mut task, error_tol, now_ms, &mut rng)?;

            println!("\n=== Simulation ===");
            println!("Solved: {}", outcome.is_solved());
            println!("Steps: {}", outcome.steps());
            println!(
                "Duration: {}",
                task.duration()
                    .map_or_else(|| "-".to_string(), format_duration)
            );
            println!("Actions: {}", task.count_actions(None));
            println!("Productive: {}", task.count_productive_actions(None));
        }
    }

    Ok(())
}
