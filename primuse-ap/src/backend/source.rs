//! Locator fetching
//!
//! A locator is either a remote URL (catalog preview or signed storage URL)
//! or a local file path. Both are read fully into memory before decoding,
//! bounded by [`FetchLimits::max_bytes`].

use super::{BackendError, BackendResult};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const FILE_SCHEME: &str = "file://";

/// Bounds applied to every fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Whole-request timeout for remote locators
    pub timeout: Duration,
    /// Largest body accepted, remote or local
    pub max_bytes: u64,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

fn too_large(what: impl std::fmt::Display, max_bytes: u64) -> BackendError {
    BackendError::TooLarge(format!("{} exceeds {} bytes", what, max_bytes))
}

/// How a locator is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorKind {
    /// `http://` or `https://`
    Remote(String),
    /// `file://` URL or bare path
    Local(PathBuf),
}

impl LocatorKind {
    pub fn parse(locator: &str) -> Self {
        let locator = locator.trim();
        let lower = locator.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            LocatorKind::Remote(locator.to_string())
        } else if lower.starts_with(FILE_SCHEME) {
            LocatorKind::Local(PathBuf::from(&locator[FILE_SCHEME.len()..]))
        } else {
            LocatorKind::Local(PathBuf::from(locator))
        }
    }

    /// File extension used as a format hint (query string ignored)
    pub fn extension_hint(&self) -> Option<String> {
        let name = match self {
            LocatorKind::Remote(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.rsplit('/').next().unwrap_or(path).to_string()
            }
            LocatorKind::Local(path) => path.file_name()?.to_string_lossy().into_owned(),
        };

        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

/// Read the full contents behind a locator
pub async fn fetch_locator(kind: &LocatorKind, limits: FetchLimits) -> BackendResult<Vec<u8>> {
    match kind {
        LocatorKind::Remote(url) => fetch_remote(url, limits).await,
        LocatorKind::Local(path) => {
            debug!("Reading local audio: {}", path.display());
            let unreachable =
                |e: std::io::Error| BackendError::Unreachable(format!("{}: {}", path.display(), e));

            let size = tokio::fs::metadata(path).await.map_err(unreachable)?.len();
            if size > limits.max_bytes {
                return Err(too_large(path.display(), limits.max_bytes));
            }
            tokio::fs::read(path).await.map_err(unreachable)
        }
    }
}

async fn fetch_remote(url: &str, limits: FetchLimits) -> BackendResult<Vec<u8>> {
    debug!("Fetching remote audio: {}", url);
    let client = reqwest::Client::builder()
        .timeout(limits.timeout)
        .build()
        .map_err(|e| BackendError::Unreachable(format!("HTTP client: {}", e)))?;

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| BackendError::Unreachable(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Unreachable(format!("{}: HTTP {}", url, status)));
    }

    if let Some(length) = response.content_length() {
        if length > limits.max_bytes {
            return Err(too_large(url, limits.max_bytes));
        }
    }

    // Content-Length may be absent or wrong; count what actually arrives
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| BackendError::Unreachable(format!("{}: {}", url, e)))?
    {
        if (body.len() + chunk.len()) as u64 > limits.max_bytes {
            return Err(too_large(url, limits.max_bytes));
        }
        body.extend_from_slice(&chunk);
    }

    debug!("Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}
