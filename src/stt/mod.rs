//! Speech-to-text: the Whisper engine, a streaming recognizer built on it,
//! and the recorder that captures one spoken command.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ VoiceActivityRecorder                                         │
//! │   AudioCaptureLoop ─frames─► StreamingRecognizer ─► Utterance │
//! │                                     │                         │
//! │                     WhisperStreamingRecognizer                │
//! │                                     │                         │
//! │                        Arc<dyn SttEngine> = WhisperEngine     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_assistant::stt::{SttEngine, TranscribeParams, WhisperEngine};
//!
//! let engine = WhisperEngine::load("models/ggml-base.bin", TranscribeParams::default())
//!     .expect("model file missing");
//! let text = engine.transcribe(&vec![0.0; 16_000]).unwrap();
//! assert!(text.is_empty());
//! ```

pub mod engine;
pub mod recognizer;
pub mod recorder;
pub mod transcribe;

pub use engine::{SttEngine, SttError, WhisperEngine, SAMPLE_RATE};
pub use recognizer::{StreamingRecognizer, WhisperStreamingRecognizer};
pub use recorder::{StopReason, Utterance, VoiceActivityRecorder};
pub use transcribe::{clean_transcript, SamplingStrategy, TranscribeParams};

#[cfg(test)]
pub use engine::MockSttEngine;
