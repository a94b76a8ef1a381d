//! Audio output using cpal
//!
//! A cpal `Stream` is not `Send`, so each loaded sound gets a dedicated
//! output thread that owns its stream. The async side only shares a
//! [`PlayCursor`] with the audio callback; dropping the [`OutputThread`]
//! stops the thread and with it the stream.

use super::{BackendError, BackendResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// List available audio output devices
pub fn list_devices() -> BackendResult<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| BackendError::Device(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// [`list_devices`] on the blocking pool, for use from async code
pub async fn enumerate_devices() -> BackendResult<Vec<String>> {
    tokio::task::spawn_blocking(list_devices)
        .await
        .map_err(|e| BackendError::Device(format!("Device enumeration task failed: {}", e)))?
}

/// Open the requested device, falling back to the default one
fn open_device(device_name: Option<&str>) -> BackendResult<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| BackendError::Device(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    host.default_output_device()
        .ok_or_else(|| BackendError::Device("No default output device found".to_string()))
}

fn device_config(device: &Device) -> BackendResult<(StreamConfig, SampleFormat)> {
    let supported = device
        .default_output_config()
        .map_err(|e| BackendError::Device(format!("Failed to get default config: {}", e)))?;
    Ok((supported.config(), supported.sample_format()))
}

/// Sample rate the output device runs at. Blocking.
pub(crate) fn probe_output_rate(device_name: Option<&str>) -> BackendResult<u32> {
    let device = open_device(device_name)?;
    let (config, _) = device_config(&device)?;
    Ok(config.sample_rate.0)
}

/// Playback position shared between the handle and the audio callback
#[derive(Debug)]
pub(crate) struct PlayCursor {
    samples: Vec<f32>,
    sample_rate: u32,
    frame: AtomicUsize,
    playing: AtomicBool,
}

impl PlayCursor {
    /// `samples` are interleaved stereo at `sample_rate`
    pub(crate) fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            frame: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
        }
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    fn frames_to_ms(&self, frames: usize) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        frames as u64 * 1000 / self.sample_rate as u64
    }

    pub(crate) fn duration_ms(&self) -> u64 {
        self.frames_to_ms(self.frames())
    }

    pub(crate) fn position_ms(&self) -> u64 {
        self.frames_to_ms(self.frame.load(Ordering::Acquire))
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub(crate) fn seek_ms(&self, position_ms: u64) {
        let frame = (position_ms.saturating_mul(self.sample_rate as u64) / 1000) as usize;
        self.frame.store(frame.min(self.frames()), Ordering::Release);
    }

    /// Fill one callback buffer. A concurrent seek wins over the advance.
    fn fill<T>(&self, data: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        let start = self.frame.load(Ordering::Acquire);
        let playing = self.playing.load(Ordering::Acquire);
        let mut frame = start;

        for out in data.chunks_mut(channels.max(1)) {
            let (left, right) = if playing && frame < self.frames() {
                let i = frame * 2;
                frame += 1;
                (self.samples[i], self.samples[i + 1])
            } else {
                (0.0, 0.0)
            };

            for (c, sample) in out.iter_mut().enumerate() {
                *sample = match c {
                    0 => T::from_sample(left.clamp(-1.0, 1.0)),
                    1 => T::from_sample(right.clamp(-1.0, 1.0)),
                    _ => T::EQUILIBRIUM,
                };
            }
        }

        if frame != start {
            let _ = self
                .frame
                .compare_exchange(start, frame, Ordering::AcqRel, Ordering::Acquire);
        }
    }
}

/// Owns the thread that keeps one output stream alive
pub(crate) struct OutputThread {
    stop_tx: Option<mpsc::Sender<()>>,
}

impl OutputThread {
    /// Spawn the output thread and wait until its stream is running
    pub(crate) async fn start(device_name: Option<String>, cursor: Arc<PlayCursor>) -> BackendResult<Self> {
        let (ready_tx, ready_rx) = oneshot::channel::<BackendResult<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("primuse-output".to_string())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), cursor) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Blocks until the handle is unloaded (sender dropped)
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Output stream closed");
            })
            .map_err(|e| BackendError::Device(format!("Failed to spawn output thread: {}", e)))?;

        ready_rx
            .await
            .map_err(|_| BackendError::Device("Output thread exited during startup".to_string()))??;

        Ok(Self {
            stop_tx: Some(stop_tx),
        })
    }

    /// Stop the stream; idempotent
    pub(crate) fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(device_name: Option<&str>, cursor: Arc<PlayCursor>) -> BackendResult<Stream> {
    let device = open_device(device_name)?;
    let (mut config, sample_format) = device_config(&device)?;
    config.sample_rate = cpal::SampleRate(cursor.sample_rate());

    info!(
        "Starting output stream: {}Hz, {} channels, {:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, cursor),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, cursor),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, cursor),
        other => {
            return Err(BackendError::Device(format!("Unsupported sample format: {:?}", other)));
        }
    }?;

    stream
        .play()
        .map_err(|e| BackendError::Device(format!("Failed to start stream: {}", e)))?;
    Ok(stream)
}

fn build_stream<T>(device: &Device, config: &StreamConfig, cursor: Arc<PlayCursor>) -> BackendResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| cursor.fill(data, channels),
            move |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| BackendError::Device(format!("Failed to build stream: {}", e)))
}
