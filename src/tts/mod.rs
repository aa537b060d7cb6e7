//! Spoken output.
//!
//! ```text
//! SpeechOutputSequencer::speak(text)          (blocking, control thread)
//!   └─► runtime.block_on(
//!         SpeechSynthesizer::synthesize_and_play(text))   (async)
//!             ├─► edge-tts / espeak-ng → temp file
//!             └─► rodio playback (spawn_blocking) → temp file removed
//! ```

pub mod cli;
pub mod playback;
pub mod sequencer;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use cli::CliSynthesizer;
pub use playback::play_file;
pub use sequencer::SpeechOutputSequencer;

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS program `{0}` not found; install it or choose another engine")]
    EngineMissing(String),

    #[error("`{program}` failed ({status}): {stderr}")]
    Synthesis {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("speech synthesis timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cannot create temporary speech file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("cannot run TTS program: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("playback of {} failed: {reason}", path.display())]
    Playback { path: PathBuf, reason: String },
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer
// ---------------------------------------------------------------------------

/// Renders `text` to audio and plays it; resolves once playback finished.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize_and_play(&self, text: &str) -> Result<(), TtsError>;
}
