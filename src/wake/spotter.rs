//! Wake-phrase spotting by transcription.
//!
//! A short rolling window of audio is watched with the energy VAD.  Once a
//! burst of speech has started and then ended (or run too long), the window
//! is transcribed and the confidence is the fraction of wake-phrase words
//! found in the transcript, in order.

use std::collections::HashMap;
use std::sync::Arc;

use super::gate::{WakeError, WakeWordModel};
use crate::audio::{i16_to_f32, RingBuffer, VadDetector};
use crate::stt::SttEngine;

/// Consecutive voiced frames before a burst counts as speech.
const ONSET_FRAMES: usize = 2;
/// Consecutive silent frames that end a burst.
const RELEASE_FRAMES: usize = 4;
/// A burst longer than this many frames is checked without waiting for
/// silence.
const MAX_BURST_FRAMES: usize = 30;

#[derive(Clone, Copy)]
enum Phase {
    Waiting { voiced_run: usize },
    Burst { frames: usize, silent_run: usize },
}

pub struct TranscriptWakeModel {
    engine: Arc<dyn SttEngine>,
    model_name: String,
    phrase_words: Vec<String>,
    vad: VadDetector,
    window: RingBuffer<f32>,
    phase: Phase,
}

impl TranscriptWakeModel {
    /// `window_samples` should cover the wake phrase plus some margin
    /// (2 s at 16 kHz works for two-word phrases).
    pub fn new(
        engine: Arc<dyn SttEngine>,
        model_name: impl Into<String>,
        phrase: &str,
        window_samples: usize,
    ) -> Self {
        Self {
            engine,
            model_name: model_name.into(),
            phrase_words: normalize(phrase),
            vad: VadDetector::default(),
            window: RingBuffer::new(window_samples),
            phase: Phase::Waiting { voiced_run: 0 },
        }
    }

    fn score(&self, transcript: &str) -> f32 {
        if self.phrase_words.is_empty() {
            return 0.0;
        }
        let heard = normalize(transcript);
        let mut heard_iter = heard.iter();
        let matched = self
            .phrase_words
            .iter()
            .filter(|word| heard_iter.any(|h| h == *word))
            .count();
        matched as f32 / self.phrase_words.len() as f32
    }

    fn check_window(&mut self) -> Result<f32, WakeError> {
        let transcript = self
            .engine
            .transcribe(&self.window.snapshot())
            .map_err(|e| WakeError::Inference(e.to_string()))?;
        let confidence = self.score(&transcript);
        log::debug!("wake check heard {transcript:?} → {confidence:.2}");
        Ok(confidence)
    }
}

impl WakeWordModel for TranscriptWakeModel {
    fn predict(&mut self, frame: &[i16]) -> Result<HashMap<String, f32>, WakeError> {
        let samples = i16_to_f32(frame);
        self.window.push_slice(&samples);
        let voiced = self.vad.is_voiced(&samples);

        let mut confidence = 0.0;
        self.phase = match self.phase {
            Phase::Waiting { voiced_run } => {
                let voiced_run = if voiced { voiced_run + 1 } else { 0 };
                if voiced_run >= ONSET_FRAMES {
                    Phase::Burst {
                        frames: voiced_run,
                        silent_run: 0,
                    }
                } else {
                    Phase::Waiting { voiced_run }
                }
            }
            Phase::Burst { frames, silent_run } => {
                let frames = frames + 1;
                let silent_run = if voiced { 0 } else { silent_run + 1 };
                if silent_run >= RELEASE_FRAMES || frames >= MAX_BURST_FRAMES {
                    let checked = self.check_window();
                    self.phase = Phase::Waiting { voiced_run: 0 };
                    confidence = checked?;
                    Phase::Waiting { voiced_run: 0 }
                } else {
                    Phase::Burst { frames, silent_run }
                }
            }
        };

        Ok(HashMap::from([(self.model_name.clone(), confidence)]))
    }

    fn reset(&mut self) {
        self.window.clear();
        self.phase = Phase::Waiting { voiced_run: 0 };
    }
}

/// Lowercase words with punctuation stripped.
fn normalize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect()
}
