mod inspect;
mod protocol;
mod serve;

use std::io;

use clap::{Parser, Subcommand};
use shipwatch::{ConfigError, LibraryError, ShipWatchError};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shipwatch", version)]
#[command(about = "Identify ships from room markers in a game log")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tail the log and answer JSON requests on stdin, one per line.
    Serve(serve::Args),
    /// Load a signature file and print what it contains.
    Check(inspect::CheckArgs),
    /// Score a single log line against a signature file.
    Match(inspect::MatchArgs),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ShipWatch(#[from] ShipWatchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve::run(args).await,
        Command::Check(args) => inspect::check(args),
        Command::Match(args) => inspect::match_line(args),
    }
}
