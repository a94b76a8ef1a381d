//! Track Resolver
//!
//! Turns records from the three upstream sources (music catalog, storage
//! backend, fingerprint match) into the canonical [`Track`]. Each source has
//! its own typed record; [`normalize`] detects the shape and dispatches.
//!
//! Locator precedence is the same for every source: `preview_url`, then
//! `url`, then `audio_path`. The first non-empty value wins. A record with no
//! usable locator fails with [`ValidationError::MissingLocator`] and never
//! reaches the player.

use crate::track::{Artwork, Track};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Raw record could not be turned into a playable track
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No non-empty `preview_url`, `url` or `audio_path`
    #[error("record has no playable audio locator")]
    MissingLocator,

    /// Raw value was not a JSON object
    #[error("record is not a JSON object")]
    NotAnObject,

    /// A known field had the wrong type
    #[error("malformed {0}")]
    Malformed(String),
}

/// Upstream source a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    /// Catalog service track (`name`, `artists`, `album.images`)
    Catalog,
    /// Storage backend song (`title`, `artist`, `image`, `audio_path`)
    Storage,
    /// Song identification result (`title`, `artist`, `cover_image_url`)
    Fingerprint,
}

impl TrackSource {
    /// Guess the source of a raw record from the fields it carries
    pub fn detect(record: &Map<String, Value>) -> Self {
        let has_album_object = record.get("album").is_some_and(Value::is_object);
        let name_only = record.contains_key("name") && !record.contains_key("title");

        if record.contains_key("artists") || has_album_object || name_only {
            TrackSource::Catalog
        } else if record.contains_key("audio_path") || record.contains_key("image") {
            TrackSource::Storage
        } else {
            TrackSource::Fingerprint
        }
    }
}

impl std::fmt::Display for TrackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackSource::Catalog => write!(f, "catalog"),
            TrackSource::Storage => write!(f, "storage"),
            TrackSource::Fingerprint => write!(f, "fingerprint"),
        }
    }
}

/// Injectable resolver used at the UI boundary
pub trait TrackResolver: Send + Sync {
    fn normalize(&self, raw: &Value) -> Result<Track, ValidationError>;
}

/// Default resolver over JSON records
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTrackResolver;

impl TrackResolver for JsonTrackResolver {
    fn normalize(&self, raw: &Value) -> Result<Track, ValidationError> {
        normalize(raw)
    }
}

/// Normalize a record from any known source
pub fn normalize(raw: &Value) -> Result<Track, ValidationError> {
    let record = raw.as_object().ok_or(ValidationError::NotAnObject)?;
    let source = TrackSource::detect(record);
    debug!("Normalizing {} record", source);

    match source {
        TrackSource::Catalog => normalize_catalog(raw),
        TrackSource::Storage => normalize_storage(raw),
        TrackSource::Fingerprint => normalize_fingerprint(raw),
    }
}

// ============================================================================
// Catalog service
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogTrack {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    artists: Vec<NamedRef>,
    #[serde(default)]
    album: Option<CatalogAlbum>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    cover_image_url: Option<String>,
    #[serde(flatten)]
    locators: Locators,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogAlbum {
    #[serde(default)]
    images: Vec<ImageRef>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    #[serde(default)]
    url: Option<String>,
}

/// Normalize a catalog service track
pub fn normalize_catalog(raw: &Value) -> Result<Track, ValidationError> {
    let record: CatalogTrack = parse(raw, TrackSource::Catalog)?;
    let locator = record.locators.resolve()?;

    let title = first_text([record.name.as_deref(), record.title.as_deref()]);
    let artist = first_text([
        record.artists.first().and_then(|a| a.name.as_deref()),
        record.artist.as_deref(),
    ]);
    let artwork = first_text([
        record
            .album
            .as_ref()
            .and_then(|album| album.images.first())
            .and_then(|image| image.url.as_deref()),
        record.image_url.as_deref(),
        record.cover_image_url.as_deref(),
    ])
    .map(|uri| Artwork::Remote(uri.to_string()));

    build(record.id.as_ref(), title, artist, locator, artwork)
}

// ============================================================================
// Storage backend
// ============================================================================

#[derive(Debug, Deserialize)]
struct StorageSong {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    image: Option<StorageImage>,
    #[serde(default)]
    cover_image_url: Option<String>,
    #[serde(flatten)]
    locators: Locators,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StorageImage {
    Signed {
        #[serde(default)]
        uri: Option<String>,
    },
    Asset(String),
}

/// Normalize a storage backend song
pub fn normalize_storage(raw: &Value) -> Result<Track, ValidationError> {
    let record: StorageSong = parse(raw, TrackSource::Storage)?;
    let locator = record.locators.resolve()?;

    let artwork = match &record.image {
        Some(StorageImage::Signed { uri }) => {
            first_text([uri.as_deref()]).map(|uri| Artwork::Remote(uri.to_string()))
        }
        Some(StorageImage::Asset(asset)) => {
            first_text([Some(asset.as_str())]).map(|asset| Artwork::LocalAsset(asset.to_string()))
        }
        None => None,
    }
    .or_else(|| {
        first_text([record.cover_image_url.as_deref()]).map(|uri| Artwork::Remote(uri.to_string()))
    });

    build(
        record.id.as_ref(),
        first_text([record.title.as_deref()]),
        first_text([record.artist.as_deref()]),
        locator,
        artwork,
    )
}

// ============================================================================
// Song identification
// ============================================================================

#[derive(Debug, Deserialize)]
struct FingerprintMatch {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    cover_image_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(flatten)]
    locators: Locators,
}

/// Normalize a song identification match
pub fn normalize_fingerprint(raw: &Value) -> Result<Track, ValidationError> {
    let record: FingerprintMatch = parse(raw, TrackSource::Fingerprint)?;
    let locator = record.locators.resolve()?;

    let artwork = first_text([record.cover_image_url.as_deref(), record.image_url.as_deref()])
        .map(|uri| Artwork::Remote(uri.to_string()));

    build(
        record.id.as_ref(),
        first_text([record.title.as_deref()]),
        first_text([record.artist.as_deref(), record.subtitle.as_deref()]),
        locator,
        artwork,
    )
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Candidate locator fields present on every upstream shape
#[derive(Debug, Default, Deserialize)]
struct Locators {
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    audio_path: Option<String>,
}

impl Locators {
    fn resolve(&self) -> Result<String, ValidationError> {
        first_text([
            self.preview_url.as_deref(),
            self.url.as_deref(),
            self.audio_path.as_deref(),
        ])
        .map(str::to_string)
        .ok_or(ValidationError::MissingLocator)
    }
}

fn parse<T: DeserializeOwned>(raw: &Value, source: TrackSource) -> Result<T, ValidationError> {
    if !raw.is_object() {
        return Err(ValidationError::NotAnObject);
    }
    T::deserialize(raw).map_err(|e| ValidationError::Malformed(format!("{} record: {}", source, e)))
}

/// First candidate that is non-empty after trimming
fn first_text<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn build(
    id: Option<&Value>,
    title: Option<&str>,
    artist: Option<&str>,
    locator: String,
    artwork: Option<Artwork>,
) -> Result<Track, ValidationError> {
    let id = match id {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => match (artist, title) {
            (Some(artist), Some(title)) => format!("{}-{}", artist, title),
            _ => locator.clone(),
        },
    };

    Ok(Track::new(
        id,
        title.unwrap_or(UNKNOWN_TITLE),
        artist.unwrap_or(UNKNOWN_ARTIST),
        locator,
    )?
    .with_artwork(artwork))
}
