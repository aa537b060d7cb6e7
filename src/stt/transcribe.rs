//! Decoding parameters and transcript clean-up.

use crate::config::SpeechRecognitionConfig;

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Owned, `Clone` mirror of `whisper_rs::SamplingStrategy`.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    Greedy { best_of: i32 },
    BeamSearch { beam_size: i32, patience: f32 },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Settings for one Whisper inference run.
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"` for language detection.
    pub language: String,
    pub strategy: SamplingStrategy,
    pub n_threads: i32,
    /// Keep Whisper's progress printing off stderr.
    pub suppress_progress: bool,
    /// Force a single segment; short commands never need more.
    pub single_segment: bool,
}

impl TranscribeParams {
    pub fn from_config(config: &SpeechRecognitionConfig) -> Self {
        Self {
            language: config.model_language.clone(),
            ..Self::default()
        }
    }
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "de".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
            single_segment: true,
        }
    }
}

/// CPU threads for inference, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// clean_transcript
// ---------------------------------------------------------------------------

/// Strip Whisper's non-speech annotations (`[BLANK_AUDIO]`, `(Musik)`,
/// `*lacht*`) and collapse whitespace.
///
/// Returns an empty string when nothing but annotations was decoded.
pub fn clean_transcript(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut closing: Option<char> = None;

    for c in raw.chars() {
        match closing {
            Some(end) if c == end => closing = None,
            Some(_) => {}
            None => match c {
                '[' => closing = Some(']'),
                '(' => closing = Some(')'),
                '*' => closing = Some('*'),
                _ => out.push(c),
            },
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
