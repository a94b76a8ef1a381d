//! Error types for primuse-ap
//!
//! `PlaybackError` is the only error type crossing the coordinator boundary.
//! Backend failures are always wrapped into one of its variants first.

use crate::backend::BackendError;
use primuse_common::ValidationError;
use thiserror::Error;

/// Typed failure of a coordinator operation
///
/// None of these are fatal to the coordinator; retrying the triggering
/// operation is always allowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Backend could not load, decode, or start the resource
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// Operation needs a loaded track but the session is idle
    #[error("No active track")]
    NoActiveTrack,

    /// Backend rejected a seek; the optimistic position stands
    #[error("Seek failed: {0}")]
    SeekFailed(String),

    /// Backend refused play or pause; session state unchanged
    #[error("Transport failed: {0}")]
    TransportFailed(String),

    /// A newer request changed the track before this one completed
    #[error("Superseded by a newer request")]
    Superseded,
}

impl PlaybackError {
    pub(crate) fn load(err: BackendError) -> Self {
        PlaybackError::LoadFailed(err.to_string())
    }

    pub(crate) fn transport(err: BackendError) -> Self {
        PlaybackError::TransportFailed(err.to_string())
    }

    pub(crate) fn seek(err: BackendError) -> Self {
        PlaybackError::SeekFailed(err.to_string())
    }
}

/// Main error type for the primuse-ap application
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Playback coordinator errors
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// Raw track record rejected by the resolver
    #[error("Invalid track: {0}")]
    Validation(#[from] ValidationError),

    /// Shared library errors (config discovery, TOML)
    #[error(transparent)]
    Common(#[from] primuse_common::Error),
}

/// Convenience Result type using primuse-ap Error
pub type Result<T> = std::result::Result<T, Error>;
