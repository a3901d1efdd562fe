//! Headless runner for the clandestine relations engine.
//!
//! Plays the demo city for a number of turns and writes every diplomatic
//! event as JSON lines.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use covert_core::logger::EventLogger;
use covert_core::{setup, CovertConfig, CovertEngine};

/// Command line arguments for the runner
#[derive(Parser, Debug)]
#[command(name = "covert_sim")]
#[command(about = "Headless runner for the clandestine relations engine")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of turns to play
    #[arg(long, default_value_t = 20)]
    turns: u64,

    /// TOML file overriding engine tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the JSONL event stream
    #[arg(long, default_value = "output/events.jsonl")]
    events_out: PathBuf,

    /// Write a JSON snapshot of the final engine state
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match CovertConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => CovertConfig::default(),
    };

    if let Some(dir) = args.events_out.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| {
                eprintln!("Warning: Could not create output directory: {}", e);
            });
        }
    }
    let mut logger = match EventLogger::new(&args.events_out) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Warning: Could not open {}: {}", args.events_out.display(), e);
            EventLogger::null()
        }
    };

    println!("Clandestine Relations Engine");
    println!("============================");
    println!("Seed: {}", args.seed);
    println!("Turns: {}", args.turns);
    println!();

    let mut engine = CovertEngine::seeded(config, setup::NETWORK_OWNER, args.seed);
    let mut ledgers = setup::create_factions(&mut engine);
    if let Err(e) = setup::open_demo(&mut engine) {
        eprintln!("Error opening demo: {}", e);
        std::process::exit(1);
    }
    let states = setup::faction_states();
    let mut logged = 0;

    for turn in 1..=args.turns {
        if let Err(e) = setup::play_turn(&mut engine, &mut ledgers, turn) {
            tracing::warn!("Turn {} script step failed: {}", turn, e);
        }
        let result = engine.process_turn(turn, &states);

        let new_events = engine.event_log().events_since(logged);
        if let Err(e) = logger.log_batch(new_events) {
            tracing::warn!("Failed to write events: {}", e);
        }
        logged = engine.event_log().len();

        if result.scandal_count() > 0 || !result.burned.is_empty() {
            println!(
                "Turn {:>3}: heat {:>5.1}  scandals {}  burned {}",
                turn,
                result.heat_after,
                result.scandal_count(),
                result.burned.len()
            );
        }
    }

    if let Err(e) = logger.flush() {
        eprintln!("Warning: Could not flush events: {}", e);
    }

    let analysis = engine.get_network_analysis();
    println!();
    println!("Simulation complete");
    println!("  Events logged: {}", logger.event_count());
    println!("  Final heat: {:.1}", engine.heat());
    println!("  Alliances: {} active, {} retired", engine.alliances().len(), engine.alliances().retired().len());
    println!(
        "  Spy network: {} active of {} recruited, security {:.2}",
        analysis.status.active_agents, analysis.status.total_agents, analysis.status.operational_security
    );

    if let Some(path) = &args.snapshot_out {
        match engine.snapshot().write_to(path) {
            Ok(()) => println!("  Snapshot written to {}", path.display()),
            Err(e) => eprintln!("Warning: Could not write snapshot: {}", e),
        }
    }
}
