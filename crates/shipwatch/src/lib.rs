//! Identifies ships from the room-code markers a game writes to its log.
//!
//! A [`ShipWatch`] service follows a growing log file, extracts `room_*`
//! markers from each new line and scores them against a [`SignatureLibrary`]
//! of known ships. Matches are queued for clients to [`ShipWatch::poll`], and
//! clients can teach the library by submitting corrections, which are written
//! back to the signature file.
//!
//! ```rust,no_run
//! use shipwatch::{ShipWatch, ShipWatchConfig};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ShipWatchConfig::new("/games/StarCitizen/LIVE/Game.log", "shiptypes.txt");
//! let service = ShipWatch::start(config).await?;
//! if let Some(event) = service.poll().event() {
//!     println!("{} ({:.3})", event.ship, event.confidence);
//! }
//! service.shutdown().await?;
//! # Ok(()) }
//! ```
//!
//! Surfaces:
//! - [`parse_line`] / [`match_markers`] for one-off scoring without a service.
//! - [`FileTailer`] for cancellable, rotation-aware log following.
//! - [`SignatureLibrary`] to load, edit and atomically persist signature files.
#![forbid(unsafe_code)]

mod config;
mod correction;
mod error;
mod library;
mod matcher;
mod parser;
mod pipeline;
mod queue;
mod service;
mod tailer;

pub use config::ShipWatchConfig;
pub use correction::{CorrectionHandler, CorrectionMode};
pub use error::{ConfigError, LibraryError, LibraryParseErrorKind, ShipWatchError, TailError};
pub use library::{
    validate_ship_name, LibraryStats, RelabelOutcome, SharedLibrary, Signature, SignatureLibrary,
};
pub use matcher::{best_match, match_markers, score, MatchResult, Score, SNAPSHOT_PREFIX};
pub use parser::{is_marker, parse_line, ParsedEvent, MARKER_PREFIX};
pub use pipeline::{EventPipeline, PipelineHandle, PipelineStats};
pub use queue::{EventQueue, DEFAULT_QUEUE_CAPACITY};
pub use service::{
    CorrectionRequest, CorrectionResponse, CorrectionStatus, HealthResponse, HealthStatus,
    NoEvent, PollResponse, ShipWatch,
};
pub use tailer::{FileTailer, TailOptions, DEFAULT_MAX_LINE_BYTES, DEFAULT_POLL_INTERVAL};
