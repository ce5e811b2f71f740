mod app;
mod game;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keepsake_config::EngineConfig;
use keepsake_core::RedbStore;

use crate::app::{Game, Greeting, PlayOutcome, SnapshotCodec};

/// Keeps a greeting and a tic-tac-toe game across runs, with move history.
#[derive(Parser, Debug)]
#[command(name = "keepsake", version, about)]
struct Cli {
    /// Directory holding the state database and config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file to use instead of `<data dir>/keepsake.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change the remembered name.
    Name {
        #[command(subcommand)]
        action: NameAction,
    },
    /// Play tic-tac-toe and move through its history.
    Game {
        #[command(subcommand)]
        action: GameAction,
    },
    /// List every stored key.
    Keys,
    /// Delete a stored key so its owner starts from defaults.
    Forget { key: String },
}

#[derive(Subcommand, Debug)]
enum NameAction {
    Show,
    Set { name: String },
}

#[derive(Subcommand, Debug)]
enum GameAction {
    Show,
    /// Place the next mark on a square (0-8, row by row).
    Play { square: usize },
    /// Jump to a step of the history (0 = game start).
    Goto { step: usize },
    Undo,
    Redo,
    Restart,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match (&cli.config, &cli.data_dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => dir.join("keepsake.json"),
        (None, None) => EngineConfig::config_path(),
    };
    let config = load_config(&config_path, cli.data_dir.as_deref());

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }
    let store = RedbStore::open(&db_path)?;
    tracing::debug!("Using state database {}", db_path.display());

    match cli.command {
        Command::Name { action } => run_name(Greeting::open(store), action),
        Command::Game { action } => run_game(
            Game::open(store, SnapshotCodec::from_pretty(config.pretty_json)),
            action,
        ),
        Command::Keys => run_keys(&store),
        Command::Forget { key } => {
            if store.remove(&key)? {
                println!("Forgot '{key}'");
            } else {
                println!("Nothing stored under '{key}'");
            }
            Ok(())
        }
    }
}

/// Loads config with a temporary warn-level subscriber so load problems are
/// reported before the configured filter is known.
fn load_config(path: &Path, data_dir: Option<&Path>) -> EngineConfig {
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .finish();
    let mut config =
        tracing::subscriber::with_default(bootstrap, || EngineConfig::load_or_create(path));
    if let Some(dir) = data_dir {
        config.data_dir = dir.display().to_string();
    }
    config
}

fn run_name(mut greeting: Greeting, action: NameAction) -> Result<()> {
    if let NameAction::Set { name } = action {
        greeting.set(&name)?;
    }
    println!("{}", greeting.render());
    Ok(())
}

fn run_game(mut game: Game, action: GameAction) -> Result<()> {
    match action {
        GameAction::Show => {}
        GameAction::Play { square } => match game.play(square)? {
            PlayOutcome::Placed(_) => {}
            PlayOutcome::Occupied => println!("Square {square} is already taken.\n"),
            PlayOutcome::AlreadyWon(mark) => println!("{mark} already won this game.\n"),
        },
        GameAction::Goto { step } => game.go_to(step)?,
        GameAction::Undo => {
            if !game.undo()? {
                println!("Already at game start.\n");
            }
        }
        GameAction::Redo => {
            if !game.redo()? {
                println!("Already at the latest move.\n");
            }
        }
        GameAction::Restart => game.restart()?,
    }
    println!("{}", game.render());
    Ok(())
}

fn run_keys(store: &Arc<RedbStore>) -> Result<()> {
    for key in store.keys()? {
        println!("{key}");
    }
    Ok(())
}
