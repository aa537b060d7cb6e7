//! Blocking speech output for the synchronous control loop.

use std::sync::Arc;

use super::{SpeechSynthesizer, TtsError};

/// Runs one utterance at a time to completion.
///
/// `speak` parks the calling thread on the tokio runtime until the
/// synthesizer reports that playback finished.  It must be called from
/// outside the runtime (the control thread), never from an async task.
pub struct SpeechOutputSequencer {
    synth: Arc<dyn SpeechSynthesizer>,
    runtime: tokio::runtime::Handle,
}

impl SpeechOutputSequencer {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>, runtime: tokio::runtime::Handle) -> Self {
        Self { synth, runtime }
    }

    /// Speak `text` and return once it has been played.  Blank text is a
    /// no-op.
    pub fn speak(&self, text: &str) -> Result<(), TtsError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        log::info!("speaking: {text}");
        self.runtime.block_on(self.synth.synthesize_and_play(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSynthesizer;

    #[test]
    fn speak_waits_for_playback_to_finish() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let synth = Arc::new(RecordingSynthesizer::with_delay(std::time::Duration::from_millis(50)));
        let sequencer = SpeechOutputSequencer::new(synth.clone(), rt.handle().clone());

        let start = std::time::Instant::now();
        sequencer.speak("Öffne den Taschenrechner").unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(50));
        assert_eq!(synth.spoken(), vec!["Öffne den Taschenrechner".to_string()]);
    }

    #[test]
    fn blank_text_is_not_spoken() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let synth = Arc::new(RecordingSynthesizer::default());
        let sequencer = SpeechOutputSequencer::new(synth.clone(), rt.handle().clone());

        sequencer.speak("   ").unwrap();
        assert!(synth.spoken().is_empty());
    }

    #[test]
    fn synthesizer_errors_are_returned() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let sequencer =
            SpeechOutputSequencer::new(Arc::new(RecordingSynthesizer::failing()), rt.handle().clone());
        assert!(sequencer.speak("Hallo").is_err());
    }
}
