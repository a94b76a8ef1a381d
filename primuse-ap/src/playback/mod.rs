//! Playback session coordination
//!
//! **Module Structure:**
//! - `coordinator.rs`: the single owner of the audio handle and session state
//! - `observers.rs`: observer registry and RAII subscriptions
//! - `poller.rs`: position polling task keyed by generation

mod coordinator;
mod observers;
mod poller;

pub use coordinator::{clamp_position, CoordinatorSettings, PlaybackCoordinator};
pub use observers::{SessionObserver, Subscription};
