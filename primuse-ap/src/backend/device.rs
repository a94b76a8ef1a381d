//! Production audio backend
//!
//! Load pipeline: fetch locator -> decode (symphonia) -> resample to the
//! device rate (rubato) -> start a paused output stream (cpal). Decoding
//! and device probing run on the blocking pool.

use super::decoder::{decode_bytes, DecodedAudio};
use super::output::{probe_output_rate, OutputThread, PlayCursor};
use super::resampler::resample;
use super::source::{fetch_locator, FetchLimits, LocatorKind};
use super::{AudioBackend, AudioHandle, BackendError, BackendResult, BackendStatus, LoadedSound};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Backend playing through a local output device
#[derive(Debug, Clone)]
pub struct DeviceBackend {
    device_name: Option<String>,
    limits: FetchLimits,
}

impl DeviceBackend {
    /// `device_name`: None = default output device
    pub fn new(device_name: Option<String>, limits: FetchLimits) -> Self {
        Self {
            device_name,
            limits,
        }
    }
}

#[async_trait]
impl AudioBackend for DeviceBackend {
    async fn load(&self, locator: &str) -> BackendResult<LoadedSound> {
        let kind = LocatorKind::parse(locator);
        let bytes = fetch_locator(&kind, self.limits).await?;

        let extension = kind.extension_hint();
        let device_name = self.device_name.clone();
        let audio = tokio::task::spawn_blocking(move || -> BackendResult<DecodedAudio> {
            let decoded = decode_bytes(bytes, extension.as_deref())?;
            let output_rate = probe_output_rate(device_name.as_deref())?;
            resample(decoded, output_rate)
        })
        .await
        .map_err(|e| BackendError::Decode(format!("Decode task failed: {}", e)))??;

        let cursor = Arc::new(PlayCursor::new(audio.samples, audio.sample_rate));
        let output = OutputThread::start(self.device_name.clone(), Arc::clone(&cursor)).await?;
        let duration_ms = cursor.duration_ms();

        info!("Loaded {} ({}ms)", locator, duration_ms);
        Ok(LoadedSound {
            handle: Box::new(DeviceSound {
                cursor,
                output: Mutex::new(Some(output)),
            }),
            duration_ms,
        })
    }
}

/// Handle over one output stream
struct DeviceSound {
    cursor: Arc<PlayCursor>,
    output: Mutex<Option<OutputThread>>,
}

impl DeviceSound {
    fn is_loaded(&self) -> bool {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn ensure_loaded(&self) -> BackendResult<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(BackendError::NotLoaded)
        }
    }
}

#[async_trait]
impl AudioHandle for DeviceSound {
    async fn play(&self) -> BackendResult<()> {
        self.ensure_loaded()?;
        self.cursor.set_playing(true);
        Ok(())
    }

    async fn pause(&self) -> BackendResult<()> {
        self.ensure_loaded()?;
        self.cursor.set_playing(false);
        Ok(())
    }

    async fn seek_to(&self, position_ms: u64) -> BackendResult<()> {
        self.ensure_loaded()?;
        self.cursor.seek_ms(position_ms);
        Ok(())
    }

    async fn status(&self) -> BackendStatus {
        BackendStatus {
            position_ms: self.cursor.position_ms(),
            duration_ms: self.cursor.duration_ms(),
            is_loaded: self.is_loaded(),
        }
    }

    async fn unload(&self) {
        self.cursor.set_playing(false);
        let output = self
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut output) = output {
            output.stop();
            debug!("Sound unloaded");
        }
    }
}
