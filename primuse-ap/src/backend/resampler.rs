//! Sample rate conversion using rubato
//!
//! Decoded audio is converted once, at load time, to the rate the output
//! device runs at. Playback then only copies frames.

use super::decoder::DecodedAudio;
use super::{BackendError, BackendResult};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as _};
use tracing::debug;

/// Convert stereo `audio` to `output_rate`.
///
/// Returns the input unchanged when the rates already match.
pub fn resample(audio: DecodedAudio, output_rate: u32) -> BackendResult<DecodedAudio> {
    if audio.sample_rate == output_rate || audio.samples.is_empty() {
        return Ok(audio);
    }

    debug!("Resampling from {}Hz to {}Hz", audio.sample_rate, output_rate);

    let planar_input = deinterleave(&audio.samples);
    let input_frames = planar_input[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / audio.sample_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        2,
    )
    .map_err(|e| BackendError::Decode(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| BackendError::Decode(format!("Resampling failed: {}", e)))?;

    let samples = interleave(&planar_output);
    debug!(
        "Resampled {} input frames to {} output frames",
        input_frames,
        samples.len() / 2
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: output_rate,
        source_channels: audio.source_channels,
    })
}

/// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32]) -> Vec<Vec<f32>> {
    let frames = samples.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in samples.chunks_exact(2) {
        left.push(frame[0]);
        right.push(frame[1]);
    }
    vec![left, right]
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    let mut output = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        output.push(planar[0][i]);
        output.push(planar[1][i]);
    }
    output
}
