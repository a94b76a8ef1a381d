//! # PriMuse Common Library
//!
//! Shared code for the PriMuse player surfaces including:
//! - The canonical `Track` value and the Track Resolver that builds it
//!   from heterogeneous upstream records
//! - Published playback session snapshots and change events
//! - Configuration file discovery
//! - Clock formatting for position/duration display

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod resolver;
pub mod track;

pub use error::{Error, Result};
pub use events::{PlaybackSession, SessionChange, SessionEvent, SessionState};
pub use resolver::{normalize, JsonTrackResolver, TrackResolver, TrackSource, ValidationError};
pub use track::{Artwork, Track};
