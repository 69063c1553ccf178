use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening the tailed log.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to open log `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log path `{path}` is not a regular file")]
    NotAFile { path: PathBuf },
    #[error("failed to seek to end of log `{path}`: {source}")]
    Seek {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a signature file line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryParseErrorKind {
    /// A marker line appeared before any ship header.
    #[error("marker `{marker}` appears before any ship header")]
    OrphanMarker { marker: String },
}

/// Errors raised by the signature library.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to read signature library `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write signature library `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("signature library line {line_number}: {kind}")]
    Parse {
        line_number: usize,
        kind: LibraryParseErrorKind,
    },
    #[error("invalid marker {marker:?}: expected `room_` followed by letters, digits or `_`")]
    InvalidMarker { marker: String },
    #[error("invalid ship name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config is missing `{field}`")]
    Missing { field: &'static str },
    #[error("config field `{field}` is invalid: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Top-level error for starting and driving a [`crate::ShipWatch`] service.
#[derive(Debug, Error)]
pub enum ShipWatchError {
    #[error(transparent)]
    Tail(#[from] TailError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
