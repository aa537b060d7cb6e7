//! Whole-buffer speech-to-text.
//!
//! [`SttEngine`] is object-safe and `Send + Sync` so one loaded model can be
//! shared behind an `Arc<dyn SttEngine>` by the wake spotter and the
//! streaming recognizer.  [`WhisperEngine`] wraps `whisper_rs`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::stt::transcribe::{clean_transcript, SamplingStrategy, TranscribeParams};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("speech model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("whisper initialisation failed: {0}")]
    ContextInit(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("audio too long: {seconds:.1} s exceeds {max_seconds} s")]
    AudioTooLong { seconds: f32, max_seconds: u32 },
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// `audio` is 16 kHz mono `f32`.  Silence or unintelligible audio yields
/// `Ok(String::new())`, not an error.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

/// The only rate Whisper decodes.
pub const SAMPLE_RATE: usize = 16_000;
/// whisper.cpp skips inputs shorter than one second, so shorter clips are
/// padded with silence up to this length.
const MIN_SAMPLES: usize = SAMPLE_RATE + SAMPLE_RATE / 10;
const MAX_SECONDS: u32 = 60;

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// A fresh `WhisperState` is created per call, so `&self` suffices and the
/// engine needs no lock.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: whisper-rs declares WhisperContext Send + Sync; the weights are
// read-only after loading and all mutable decoding state lives in the
// per-call WhisperState.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.to_path_buf()));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| SttError::ModelNotFound(path.to_path_buf()))?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!(
            "loaded speech model {} (language {})",
            path.display(),
            params.language
        );
        Ok(Self { ctx, params })
    }

    fn full_params(&self) -> FullParams<'_, '_> {
        use whisper_rs::SamplingStrategy as WS;
        let strategy = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch {
                beam_size,
                patience,
            } => WS::BeamSearch {
                beam_size,
                patience,
            },
        };

        let mut fp = FullParams::new(strategy);
        let language = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(language);
        fp.set_n_threads(self.params.n_threads);
        fp.set_single_segment(self.params.single_segment);
        fp.set_no_context(true);
        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
            fp.set_print_special(false);
        }
        fp
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        if audio.is_empty() {
            return Ok(String::new());
        }
        if audio.len() > MAX_SECONDS as usize * SAMPLE_RATE {
            return Err(SttError::AudioTooLong {
                seconds: audio.len() as f32 / SAMPLE_RATE as f32,
                max_seconds: MAX_SECONDS,
            });
        }

        let padded;
        let audio = if audio.len() < MIN_SAMPLES {
            let mut buf = audio.to_vec();
            buf.resize(MIN_SAMPLES, 0.0);
            padded = buf;
            padded.as_slice()
        } else {
            audio
        };

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;
        state
            .full(self.full_params(), audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
            text.push(' ');
        }

        Ok(clean_transcript(&text))
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Returns scripted transcripts in order, then repeats the last one.
#[cfg(test)]
pub struct MockSttEngine {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, SttError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: impl Into<String>) -> Self {
        Self::script([Ok(text.into())])
    }

    pub fn err(error: SttError) -> Self {
        Self::script([Err(error)])
    }

    pub fn script(responses: impl IntoIterator<Item = Result<String, SttError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, SttError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses.front().cloned().unwrap_or_else(|| Ok(String::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let result = WhisperEngine::load("/nonexistent/ggml-base.bin", TranscribeParams::default());
        assert!(
            matches!(result, Err(SttError::ModelNotFound(_))),
            "expected ModelNotFound, got: {result:?}"
        );
    }

    #[test]
    fn error_messages_name_the_problem() {
        let e = SttError::ModelNotFound(PathBuf::from("/models/ggml-base.bin"));
        assert!(e.to_string().contains("ggml-base.bin"));

        let e = SttError::AudioTooLong {
            seconds: 61.0,
            max_seconds: 60,
        };
        assert!(e.to_string().contains("61.0"));
    }

    #[test]
    fn mock_plays_script_then_repeats_last() {
        let engine = MockSttEngine::script([Ok("eins".to_string()), Ok("zwei".to_string())]);
        assert_eq!(engine.transcribe(&[]).unwrap(), "eins");
        assert_eq!(engine.transcribe(&[]).unwrap(), "zwei");
        assert_eq!(engine.transcribe(&[]).unwrap(), "zwei");
        assert_eq!(engine.calls(), 3);
    }

    #[test]
    fn engine_is_object_safe() {
        let engine: Box<dyn SttEngine> = Box::new(MockSttEngine::ok("ok"));
        assert_eq!(engine.transcribe(&[0.0; 16]).unwrap(), "ok");
    }
}
