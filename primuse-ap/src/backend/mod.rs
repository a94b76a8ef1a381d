//! Audio Backend capability
//!
//! The coordinator talks to audio hardware only through these traits.
//! `AudioBackend::load` produces an exclusively owned `AudioHandle`; the
//! coordinator decides whether to install it or, when the load was
//! superseded, to unload it immediately.

mod decoder;
mod device;
mod output;
mod resampler;
mod source;

pub use decoder::{decode_bytes, DecodedAudio};
pub use device::DeviceBackend;
pub use output::{enumerate_devices, list_devices};
pub use resampler::resample;
pub use source::{fetch_locator, FetchLimits, LocatorKind};

use async_trait::async_trait;
use thiserror::Error;

/// Opaque platform-level failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Locator could not be fetched (missing file, HTTP failure)
    #[error("Resource unreachable: {0}")]
    Unreachable(String),

    /// Container or codec not supported
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// Stream could be opened but not decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Output device unavailable or audio session denied
    #[error("Audio device error: {0}")]
    Device(String),

    /// Fetched resource exceeds the configured size cap
    #[error("Resource too large: {0}")]
    TooLarge(String),

    /// Handle was already unloaded
    #[error("Sound not loaded")]
    NotLoaded,

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

/// Backend result type
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Point-in-time status of a loaded sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendStatus {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_loaded: bool,
}

/// A freshly loaded sound, paused at position 0
pub struct LoadedSound {
    pub handle: Box<dyn AudioHandle>,
    pub duration_ms: u64,
}

impl std::fmt::Debug for LoadedSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSound")
            .field("duration_ms", &self.duration_ms)
            .finish_non_exhaustive()
    }
}

/// Factory for sound handles
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Load the resource behind `locator`
    async fn load(&self, locator: &str) -> BackendResult<LoadedSound>;
}

/// One loaded sound
///
/// Implementations synchronize internally; every method takes `&self`.
#[async_trait]
pub trait AudioHandle: Send + Sync {
    async fn play(&self) -> BackendResult<()>;

    async fn pause(&self) -> BackendResult<()>;

    async fn seek_to(&self, position_ms: u64) -> BackendResult<()>;

    async fn status(&self) -> BackendStatus;

    /// Best-effort release; must not fail
    async fn unload(&self);
}
