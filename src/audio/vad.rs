//! Energy-based voice activity detection.
//!
//! Used in two places: the wake spotter and the streaming recognizer only
//! spend a Whisper decode when the most recent frame is voiced, and the final
//! recognition pass trims leading/trailing silence so Whisper does not
//! hallucinate text on quiet audio.

/// Root-mean-square amplitude of `samples` (0.0 for an empty slice).
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

// ---------------------------------------------------------------------------
// VadDetector
// ---------------------------------------------------------------------------

/// RMS threshold classifier over fixed-size sub-frames.
#[derive(Debug, Clone)]
pub struct VadDetector {
    rms_threshold: f32,
    /// Sub-frame size for trimming (480 samples = 30 ms at 16 kHz).
    window: usize,
}

impl VadDetector {
    /// Typical quiet-room threshold.
    pub const DEFAULT_THRESHOLD: f32 = 0.01;

    pub fn new(rms_threshold: f32) -> Self {
        Self {
            rms_threshold,
            window: 480,
        }
    }

    /// Use a different trimming window, e.g. for sample rates other than
    /// 16 kHz.  A zero window is treated as one sample.
    pub fn with_window(rms_threshold: f32, window: usize) -> Self {
        Self {
            rms_threshold,
            window: window.max(1),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    /// `true` when the frame's RMS exceeds the threshold.
    pub fn is_voiced(&self, frame: &[f32]) -> bool {
        !frame.is_empty() && rms(frame) > self.rms_threshold
    }

    /// Slice of `audio` from the first to the last voiced window.
    ///
    /// Returns an empty slice when nothing is voiced.
    pub fn trim_silence<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        let voiced: Vec<usize> = audio
            .chunks(self.window)
            .enumerate()
            .filter(|(_, w)| self.is_voiced(w))
            .map(|(i, _)| i)
            .collect();

        match (voiced.first(), voiced.last()) {
            (Some(&first), Some(&last)) => {
                let start = first * self.window;
                let end = ((last + 1) * self.window).min(audio.len());
                &audio[start..end]
            }
            _ => &audio[0..0],
        }
    }
}

impl Default for VadDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
