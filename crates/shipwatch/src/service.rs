use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ShipWatchConfig;
use crate::correction::{CorrectionHandler, CorrectionMode};
use crate::error::{ConfigError, ShipWatchError};
use crate::library::{RelabelOutcome, SharedLibrary, SignatureLibrary};
use crate::matcher::MatchResult;
use crate::pipeline::{EventPipeline, PipelineHandle, PipelineStats};
use crate::queue::EventQueue;
use crate::tailer::FileTailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

/// Payload returned by [`ShipWatch::poll`] when the queue is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoEvent {
    pub event: &'static str,
    pub ship: Option<String>,
    pub confidence: f64,
}

impl NoEvent {
    pub const SENTINEL: NoEvent = NoEvent {
        event: "none",
        ship: None,
        confidence: 0.0,
    };
}

/// Either the oldest queued match or the no-event sentinel.
///
/// The two shapes differ on the wire (`{"event": "none", ...}` vs
/// `{"ship", "confidence", "is_snapshot"}`); existing clients depend on both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    Idle(NoEvent),
    Event(MatchResult),
}

impl PollResponse {
    pub fn event(&self) -> Option<&MatchResult> {
        match self {
            Self::Idle(_) => None,
            Self::Event(result) => Some(result),
        }
    }

    pub fn into_event(self) -> Option<MatchResult> {
        match self {
            Self::Idle(_) => None,
            Self::Event(result) => Some(result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRequest {
    pub wrong_ship: String,
    pub correct_ship: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Updated,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionResponse {
    pub status: CorrectionStatus,
}

/// A running ship-identification service.
///
/// Owns the signature library, the event queue and the background pipeline
/// tailing the game log. All request methods are safe to call concurrently.
#[derive(Debug)]
pub struct ShipWatch {
    config: ShipWatchConfig,
    library: SharedLibrary,
    queue: Arc<EventQueue>,
    corrections: CorrectionHandler,
    pipeline: PipelineHandle,
}

impl ShipWatch {
    /// Loads the library, opens the log and starts the pipeline.
    ///
    /// Fails if the configuration is incomplete, the signature file cannot be
    /// read or parsed, or the log file cannot be opened.
    pub async fn start(config: ShipWatchConfig) -> Result<Self, ShipWatchError> {
        config.validate()?;
        let log_path = config
            .log_path
            .clone()
            .ok_or(ConfigError::Missing { field: "log_path" })?;
        let signatures_path = config
            .signatures_path
            .clone()
            .ok_or(ConfigError::Missing {
                field: "signatures_path",
            })?;

        let library = SignatureLibrary::load(&signatures_path)?;
        let stats = library.stats();
        info!(
            path = %signatures_path.display(),
            ships = stats.ships,
            tokens = stats.tokens,
            distinct_tokens = stats.distinct_tokens,
            "loaded signature library"
        );
        let library: SharedLibrary = Arc::new(RwLock::new(library));

        let tailer =
            FileTailer::open(&log_path, config.tail_options(), CancellationToken::new()).await?;
        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        let pipeline =
            EventPipeline::new(tailer, Arc::clone(&library), Arc::clone(&queue)).spawn();
        let corrections = CorrectionHandler::new(Arc::clone(&library), signatures_path);

        info!(
            log_path = %log_path.display(),
            correction_mode = ?config.correction_mode,
            "shipwatch started"
        );

        Ok(Self {
            config,
            library,
            queue,
            corrections,
            pipeline,
        })
    }

    pub fn config(&self) -> &ShipWatchConfig {
        &self.config
    }

    pub fn library(&self) -> &SharedLibrary {
        &self.library
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Ok,
        }
    }

    /// Returns the oldest pending match, or the sentinel if there is none.
    /// Never waits for the pipeline.
    pub fn poll(&self) -> PollResponse {
        match self.queue.try_pop() {
            Some(result) => PollResponse::Event(result),
            None => PollResponse::Idle(NoEvent::SENTINEL),
        }
    }

    /// Moves every token of `wrong_ship` onto `correct_ship` and saves the
    /// library.
    ///
    /// In lenient mode an unknown `wrong_ship` is still reported as updated.
    /// The file write runs on tokio's blocking pool.
    pub async fn submit_correction(
        &self,
        request: &CorrectionRequest,
    ) -> Result<CorrectionResponse, ShipWatchError> {
        let corrections = self.corrections.clone();
        let CorrectionRequest {
            wrong_ship,
            correct_ship,
        } = request.clone();
        let outcome =
            tokio::task::spawn_blocking(move || corrections.relabel(&wrong_ship, &correct_ship))
                .await??;
        let status = match (outcome, self.config.correction_mode) {
            (RelabelOutcome::NotFound, CorrectionMode::Strict) => CorrectionStatus::NotFound,
            _ => CorrectionStatus::Updated,
        };
        Ok(CorrectionResponse { status })
    }

    /// Stops the pipeline and waits for it to finish.
    pub async fn shutdown(self) -> Result<PipelineStats, ShipWatchError> {
        let stats = self.pipeline.shutdown().await?;
        info!(
            pending_events = self.queue.len(),
            dropped_events = self.queue.dropped(),
            "shipwatch stopped"
        );
        Ok(stats)
    }
}
