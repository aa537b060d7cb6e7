//! Sample-format conversion between the device stream and fixed frames.
//!
//! Devices deliver interleaved `f32` at their native rate; the wake model and
//! recognizer want mono `i16` at the configured rate in frames of exactly
//! `chunk_samples`.  The steps, in order:
//!
//! ```text
//! interleaved f32 ─► downmix ─► resample ─► FrameChunker ─► i16 frames
//! ```

// ---------------------------------------------------------------------------
// downmix
// ---------------------------------------------------------------------------

/// Average interleaved channels into one.
///
/// The output length is `samples.len() / channels`; a trailing partial frame
/// is dropped.  `channels == 0` yields an empty vector.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Linear-interpolation resampler from `from_rate` to `to_rate`.
///
/// Equal rates return a copy.  The output length is
/// `ceil(samples.len() * to_rate / from_rate)`.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let step = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let next = samples[(idx + 1).min(last)];
            samples[idx] * (1.0 - frac) + next * frac
        })
        .collect()
}

// ---------------------------------------------------------------------------
// i16 <-> f32
// ---------------------------------------------------------------------------

/// Convert a normalised `f32` sample to `i16`, clamping out-of-range input.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Convert a whole frame of `i16` samples to normalised `f32`.
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 / i16::MAX as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// FrameChunker
// ---------------------------------------------------------------------------

/// Accumulates mono samples of arbitrary length and emits `i16` frames of
/// exactly `frame_len` samples.
///
/// Lives inside the device callback, so it is only ever touched by the
/// audio thread.
#[derive(Debug)]
pub struct FrameChunker {
    frame_len: usize,
    pending: Vec<f32>,
}

impl FrameChunker {
    pub fn new(frame_len: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len * 2),
        }
    }

    /// Append `samples` and call `emit` once per completed frame.
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(Vec<i16>)) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_len {
            let frame = self
                .pending
                .drain(..self.frame_len)
                .map(f32_to_i16)
                .collect();
            emit(frame);
        }
    }

    /// Samples waiting for the next frame boundary.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
