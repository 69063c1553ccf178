use std::path::PathBuf;

use shipwatch::{ConfigError, CorrectionMode, ShipWatch, ShipWatchConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::{protocol, Error};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// TOML config file; flags below override its values.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Game log to follow.
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Signature library file; corrections are written back here.
    #[arg(long)]
    pub signatures_path: Option<PathBuf>,

    /// Idle sleep between log reads, in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Report corrections naming an unknown ship as `not_found`.
    #[arg(long)]
    pub strict_corrections: bool,
}

impl Args {
    pub fn resolve_config(&self) -> Result<ShipWatchConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ShipWatchConfig::from_toml_path(path)?,
            None => ShipWatchConfig::default(),
        };
        if let Some(path) = &self.log_path {
            config.log_path = Some(path.clone());
        }
        if let Some(path) = &self.signatures_path {
            config.signatures_path = Some(path.clone());
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
        if self.strict_corrections {
            config.correction_mode = CorrectionMode::Strict;
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn run(args: Args) -> Result<(), Error> {
    let config = args.resolve_config()?;
    let service = ShipWatch::start(config).await?;

    let served = serve_requests(&service).await;
    let stats = service.shutdown().await?;
    info!(
        lines_read = stats.lines_read,
        matches_enqueued = stats.matches_enqueued,
        "shutdown complete"
    );
    served
}

async fn serve_requests(service: &ShipWatch) -> Result<(), Error> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut interrupt => {
                info!("interrupted; shutting down");
                return Ok(());
            }
        };
        let Some(line) = line else {
            debug!("stdin closed; shutting down");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = protocol::handle_line(service, &line).await;
        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        stdout.write_all(payload.as_bytes()).await?;
        stdout.flush().await?;
    }
}
