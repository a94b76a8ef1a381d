//! Canonical playable track
//!
//! A `Track` is the only shape the playback coordinator accepts. It is built
//! by the Track Resolver from upstream records and can never carry an empty
//! audio locator: construction and deserialization both reject it.

use crate::resolver::ValidationError;
use serde::{Deserialize, Serialize};

/// Cover art reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Artwork {
    /// Remote image URI
    Remote(String),
    /// Opaque reference to an asset bundled with the client
    LocalAsset(String),
}

/// A playable unit normalized from any upstream source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TrackRecord")]
pub struct Track {
    id: String,
    title: String,
    artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    artwork: Option<Artwork>,
    audio_locator: String,
}

/// Unchecked wire form of `Track`
#[derive(Deserialize)]
struct TrackRecord {
    id: String,
    title: String,
    artist: String,
    #[serde(default)]
    artwork: Option<Artwork>,
    audio_locator: String,
}

impl TryFrom<TrackRecord> for Track {
    type Error = ValidationError;

    fn try_from(record: TrackRecord) -> Result<Self, Self::Error> {
        Ok(Track::new(record.id, record.title, record.artist, record.audio_locator)?
            .with_artwork(record.artwork))
    }
}

impl Track {
    /// Build a track, rejecting an empty (or whitespace-only) locator.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio_locator: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let audio_locator = audio_locator.into().trim().to_string();
        if audio_locator.is_empty() {
            return Err(ValidationError::MissingLocator);
        }

        Ok(Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            artwork: None,
            audio_locator,
        })
    }

    /// Attach (or clear) the cover art reference
    pub fn with_artwork(mut self, artwork: Option<Artwork>) -> Self {
        self.artwork = artwork;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn artwork(&self) -> Option<&Artwork> {
        self.artwork.as_ref()
    }

    /// Locator handed to the audio backend
    pub fn audio_locator(&self) -> &str {
        &self.audio_locator
    }
}
