//! Incremental recognition on top of a whole-buffer [`SttEngine`].
//!
//! Whisper has no native streaming mode, so [`WhisperStreamingRecognizer`]
//! approximates one:
//!
//! ```text
//!  frame ─► VAD ─┬─ voiced ──► every `decode_every` voiced frames:
//!                │             decode recent window → partial_result()
//!                └─ silent ──► after `endpoint_frames` of silence following
//!                              speech: decode the segment → accept() == true,
//!                              result() returns it
//! ```
//!
//! Silent frames clear the partial text, so callers that treat "non-empty
//! text" as "speech is happening" see silence as silence.

use std::sync::Arc;

use crate::audio::{i16_to_f32, RingBuffer, VadDetector};
use crate::stt::engine::SttEngine;

// ---------------------------------------------------------------------------
// StreamingRecognizer trait
// ---------------------------------------------------------------------------

/// Frame-by-frame recognizer consumed by the recorder.
pub trait StreamingRecognizer: Send {
    /// Forget all audio and text from a previous session.
    fn reset(&mut self);

    /// Feed one frame.  Returns `true` when a segment was finalized; its
    /// text is then available from [`StreamingRecognizer::result`].
    fn accept(&mut self, frame: &[i16]) -> bool;

    /// Take the most recently finalized text (empty if none).
    fn result(&mut self) -> String;

    /// Interim text for the speech currently in progress.
    fn partial_result(&self) -> String;

    /// Decode the whole session's audio once more and return the best text.
    fn final_result(&mut self, audio: &[i16]) -> String;
}

// ---------------------------------------------------------------------------
// WhisperStreamingRecognizer
// ---------------------------------------------------------------------------

pub struct WhisperStreamingRecognizer {
    engine: Arc<dyn SttEngine>,
    vad: VadDetector,
    /// Most recent audio for interim decodes.
    window: RingBuffer<f32>,
    /// Audio since the last finalized segment.
    segment: Vec<f32>,
    decode_every: usize,
    endpoint_frames: usize,
    voiced_since_decode: usize,
    silent_run: usize,
    in_speech: bool,
    partial: String,
    finalized: String,
}

impl WhisperStreamingRecognizer {
    /// `sample_rate` / `chunk_samples` describe the incoming frames and set
    /// the window (3 s), interim decode cadence (~0.5 s of voice) and
    /// endpoint (~0.6 s of silence).
    pub fn new(engine: Arc<dyn SttEngine>, sample_rate: u32, chunk_samples: usize) -> Self {
        let frames_per_sec = (sample_rate as usize / chunk_samples.max(1)).max(1);
        Self {
            engine,
            vad: VadDetector::default(),
            window: RingBuffer::new(sample_rate as usize * 3),
            segment: Vec::new(),
            decode_every: (frames_per_sec / 2).max(1),
            endpoint_frames: (frames_per_sec * 6 / 10).max(1),
            voiced_since_decode: 0,
            silent_run: 0,
            in_speech: false,
            partial: String::new(),
            finalized: String::new(),
        }
    }

    fn decode(&self, audio: &[f32]) -> String {
        match self.engine.transcribe(audio) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("interim decode failed: {e}");
                String::new()
            }
        }
    }
}

impl StreamingRecognizer for WhisperStreamingRecognizer {
    fn reset(&mut self) {
        self.window.clear();
        self.segment.clear();
        self.voiced_since_decode = 0;
        self.silent_run = 0;
        self.in_speech = false;
        self.partial.clear();
        self.finalized.clear();
    }

    fn accept(&mut self, frame: &[i16]) -> bool {
        let samples = i16_to_f32(frame);
        self.window.push_slice(&samples);

        if self.vad.is_voiced(&samples) {
            self.in_speech = true;
            self.silent_run = 0;
            self.segment.extend_from_slice(&samples);
            self.voiced_since_decode += 1;
            if self.voiced_since_decode >= self.decode_every {
                self.voiced_since_decode = 0;
                self.partial = self.decode(&self.window.snapshot());
            }
            return false;
        }

        self.partial.clear();
        if !self.in_speech {
            return false;
        }

        self.segment.extend_from_slice(&samples);
        self.silent_run += 1;
        if self.silent_run < self.endpoint_frames {
            return false;
        }

        let segment = std::mem::take(&mut self.segment);
        self.in_speech = false;
        self.silent_run = 0;
        self.voiced_since_decode = 0;
        self.finalized = self.decode(self.vad.trim_silence(&segment));
        !self.finalized.is_empty()
    }

    fn result(&mut self) -> String {
        std::mem::take(&mut self.finalized)
    }

    fn partial_result(&self) -> String {
        self.partial.clone()
    }

    fn final_result(&mut self, audio: &[i16]) -> String {
        let samples = i16_to_f32(audio);
        let voiced = self.vad.trim_silence(&samples);
        if voiced.is_empty() {
            return String::new();
        }
        self.decode(voiced)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
