//! Wake-phrase detection: the [`WakeGate`] that decides when a frame counts
//! as a trigger, and a Whisper-based [`TranscriptWakeModel`] to score frames.

pub mod gate;
pub mod spotter;

pub use gate::{DetectionResult, WakeError, WakeGate, WakeWordModel};
pub use spotter::TranscriptWakeModel;
