//! rustyCreep - The Castles of Dr. Creep
//!
//! This is the main entry point. It handles command-line arguments, loads the
//! game data and the chosen castle, and runs the game in a window.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

use rusty_creep::game::{Game, GameConfig, Pacing, SCALE_FACTOR};
use rusty_creep::persistence::{DiskStore, Persistence};

/// Command line arguments for rustyCreep
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Castle to play (with or without its Z prefix)
    #[clap(name = "CASTLE", default_value = "Tutorial")]
    castle: String,

    /// Directory holding OBJECT, char.rom and the castle files
    #[clap(long, default_value = "data")]
    data: PathBuf,

    /// Resume a saved position instead of starting a new game
    #[clap(long)]
    position: Option<String>,

    /// Start a two player game
    #[clap(short = '2', long)]
    two_players: bool,

    /// Deaths never cost a life
    #[clap(short, long)]
    unlimited: bool,

    /// List the castles found in the data directory and exit
    #[clap(short, long)]
    list: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// Pace to NTSC (60 Hz) instead of PAL (50 Hz)
    #[clap(long)]
    ntsc: bool,

    /// Scale factor for display
    #[clap(short, long, default_value_t = SCALE_FACTOR)]
    scale: u32,

    /// Effect volume (0.0 - 1.0)
    #[clap(long, default_value_t = 0.25)]
    volume: f32,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("rustyCreep starting...");

    let store = DiskStore::new(&args.data);

    if args.list {
        let castles = store
            .castles()
            .with_context(|| format!("Failed to list castles in {}", args.data.display()))?;
        for castle in castles {
            println!("{}", castle);
        }
        return Ok(());
    }

    let config = GameConfig {
        data_dir: args.data.clone(),
        castle: args.castle.clone(),
        position: args.position,
        players: if args.two_players { 2 } else { 1 },
        unlimited_lives: args.unlimited,
        scale: args.scale,
        pacing: if args.ntsc { Pacing::Ntsc } else { Pacing::Pal },
        volume: args.volume,
    };

    info!("Loading castle {} from {}", args.castle, args.data.display());
    let mut game = Game::new(store, config)
        .with_context(|| format!("Failed to start castle {}", args.castle))?;

    match game.run() {
        Ok(_) => {
            info!("Game finished");
            Ok(())
        }
        Err(e) => {
            error!("Game error: {}", e);
            Err(e)
        }
    }
}
