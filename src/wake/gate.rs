//! Wake-phrase gating with cooldown and pause.
//!
//! Suppression is structural: while paused or inside the cooldown window
//! [`WakeGate::detect`] returns before the model is ever called, so the
//! assistant's own voice cannot re-trigger it during playback.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::WakeWordConfig;

// ---------------------------------------------------------------------------
// WakeWordModel
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("wake model inference failed: {0}")]
    Inference(String),
}

/// External wake-word scorer.  Returns a confidence in `0.0..=1.0` per
/// model name it knows.
pub trait WakeWordModel: Send {
    fn predict(&mut self, frame: &[i16]) -> Result<HashMap<String, f32>, WakeError>;

    /// Drop any internal audio history.  Called when the gate re-arms.
    fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// DetectionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    pub detected: bool,
    /// Meaningless when the gate suppressed the frame.
    pub confidence: f32,
}

impl DetectionResult {
    const SUPPRESSED: Self = Self {
        detected: false,
        confidence: 0.0,
    };
}

// ---------------------------------------------------------------------------
// WakeGate
// ---------------------------------------------------------------------------

pub struct WakeGate {
    model: Box<dyn WakeWordModel>,
    model_name: String,
    threshold: f32,
    cooldown: Duration,
    last_detection: Option<Instant>,
    paused: bool,
}

impl WakeGate {
    pub fn new(model: Box<dyn WakeWordModel>, config: &WakeWordConfig) -> Self {
        Self {
            model,
            model_name: config.model_name.clone(),
            threshold: config.threshold,
            cooldown: Duration::from_secs_f64(config.cooldown_seconds),
            last_detection: None,
            paused: false,
        }
    }

    /// Score one frame.
    ///
    /// Detection requires `confidence > threshold`.  Model failures are
    /// logged and reported as "not detected".
    pub fn detect(&mut self, frame: &[i16]) -> DetectionResult {
        if self.paused || self.in_cooldown() {
            return DetectionResult::SUPPRESSED;
        }

        let scores = match self.model.predict(frame) {
            Ok(scores) => scores,
            Err(e) => {
                log::warn!("{e}");
                return DetectionResult::SUPPRESSED;
            }
        };

        let confidence = scores.get(&self.model_name).copied().unwrap_or(0.0);
        if confidence > self.threshold {
            self.last_detection = Some(Instant::now());
            log::info!(
                "wake word '{}' detected (confidence {confidence:.2})",
                self.model_name
            );
            DetectionResult {
                detected: true,
                confidence,
            }
        } else {
            DetectionResult {
                detected: false,
                confidence,
            }
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Re-arm detection.  The cooldown timer keeps running.
    pub fn resume(&mut self) {
        if self.paused {
            self.model.reset();
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Forget the last detection so the next frame is scored normally.
    pub fn reset_cooldown(&mut self) {
        self.last_detection = None;
    }

    pub fn in_cooldown(&self) -> bool {
        self.last_detection
            .is_some_and(|at| at.elapsed() < self.cooldown)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
