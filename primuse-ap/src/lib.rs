//! # PriMuse Audio Player Library (primuse-ap)
//!
//! Single-session playback coordination.
//!
//! **Purpose:** Own the one live audio handle, serialize play/pause/seek/skip
//! requests against it, poll position while playing, and publish session
//! snapshots to any number of observers (mini player, full player, SSE
//! clients) without exposing the handle.
//!
//! **Architecture:** `PlaybackCoordinator` over an injected `AudioBackend`
//! (symphonia + rubato + cpal in production, scripted in tests), exposed
//! through an axum control API.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, PlaybackError, Result};
pub use playback::PlaybackCoordinator;
