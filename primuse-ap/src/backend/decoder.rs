//! Audio decoding using symphonia
//!
//! Decodes a fully fetched resource (MP3, AAC/M4A, FLAC, Vorbis, WAV) to
//! interleaved stereo f32 samples. Mono sources are duplicated to both
//! channels; sources with more than two channels keep the first two.

use super::{BackendError, BackendResult};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Fully decoded audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved stereo samples
    pub samples: Vec<f32>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
    /// Channel count of the source before stereo conversion
    pub source_channels: u16,
}

impl DecodedAudio {
    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Decode an in-memory resource.
///
/// `extension` is only a hint; the container is probed from content.
///
/// # Errors
/// - `Unsupported` if no container/codec matches
/// - `Decode` if the stream has no audio track or yields no samples
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> BackendResult<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| BackendError::Unsupported(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BackendError::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| BackendError::Decode("Sample rate not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| BackendError::Unsupported(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut source_channels = track.codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                warn!("Stream reset required, stopping decode");
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame; skip it and keep going
                warn!("Decode error: {}", e);
                continue;
            }
            Err(e) => return Err(BackendError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        source_channels = channels as u16;

        let needed = decoded.capacity() * channels;
        if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            append_stereo(buf.samples(), channels, &mut samples);
        }
    }

    if samples.is_empty() {
        return Err(BackendError::Decode("Stream contained no audio".to_string()));
    }

    let audio = DecodedAudio {
        samples,
        sample_rate,
        source_channels,
    };
    debug!(
        "Decoded {} frames at {}Hz ({} source channels, {}ms)",
        audio.frames(),
        audio.sample_rate,
        audio.source_channels,
        audio.duration_ms()
    );
    Ok(audio)
}

/// Append interleaved `input` with `channels` channels as stereo
fn append_stereo(input: &[f32], channels: usize, output: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => {
            output.reserve(input.len() * 2);
            for &s in input {
                output.push(s);
                output.push(s);
            }
        }
        2 => output.extend_from_slice(input),
        n => {
            output.reserve(input.len() / n * 2);
            for frame in input.chunks_exact(n) {
                output.push(frame[0]);
                output.push(frame[1]);
            }
        }
    }
}
