//! Published playback state
//!
//! Observers never touch the audio handle. They receive a read-only
//! [`PlaybackSession`] snapshot together with the [`SessionChange`] that
//! produced it. The same shape is serialized for the SSE stream.

use crate::track::Track;
use serde::{Deserialize, Serialize};

/// Snapshot of the single playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSession {
    /// Track currently loaded (None when idle)
    pub current_track: Option<Track>,
    /// Backend confirmed playing
    pub is_playing: bool,
    /// Last known playback offset in milliseconds
    pub position_ms: u64,
    /// Loaded duration in milliseconds (0 until known)
    pub duration_ms: u64,
    /// Bumped whenever the current track changes; stale async results compare against it
    pub generation: u64,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_track: None,
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            generation: 0,
        }
    }
}

impl PlaybackSession {
    /// True when no track is loaded
    pub fn is_idle(&self) -> bool {
        self.current_track.is_none()
    }

    /// Reset every track field to its default, keeping the generation counter
    pub fn clear_track(&mut self) {
        self.current_track = None;
        self.is_playing = false;
        self.position_ms = 0;
        self.duration_ms = 0;
    }

    /// Coarse consumer-facing state
    pub fn state(&self) -> SessionState {
        match (&self.current_track, self.is_playing) {
            (None, _) => SessionState::Idle,
            (Some(_), true) => SessionState::Playing,
            (Some(_), false) => SessionState::Paused,
        }
    }
}

/// Consumer view of the session state machine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Playing,
    Paused,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Paused => write!(f, "paused"),
        }
    }
}

/// What mutated the session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionChange {
    /// A track was installed, or the previous one was dropped by a new load
    TrackChanged,
    /// Play/pause flipped after backend confirmation
    PlayStateChanged,
    /// Position moved (poll tick or seek)
    PositionChanged,
    /// Backend reported a new duration
    DurationKnown,
    /// Playback reached the end of the track
    Finished,
    /// Session returned to idle
    Released,
}

impl SessionChange {
    /// Name used as the SSE event type
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionChange::TrackChanged => "TrackChanged",
            SessionChange::PlayStateChanged => "PlayStateChanged",
            SessionChange::PositionChanged => "PositionChanged",
            SessionChange::DurationKnown => "DurationKnown",
            SessionChange::Finished => "Finished",
            SessionChange::Released => "Released",
        }
    }
}

impl std::fmt::Display for SessionChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification delivered to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub change: SessionChange,
    pub session: PlaybackSession,
    /// When the mutation was applied
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SessionEvent {
    pub fn new(change: SessionChange, session: PlaybackSession) -> Self {
        Self {
            change,
            session,
            timestamp: chrono::Utc::now(),
        }
    }
}
