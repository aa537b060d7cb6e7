//! Records one spoken command and decides when it is over.
//!
//! [`VoiceActivityRecorder::record`] owns a capture session for its whole
//! duration.  Each poll tick it feeds every queued frame to the streaming
//! recognizer, then evaluates the stop condition:
//!
//! ```text
//! stop = (speech_started && now - last_speech > silence_timeout)
//!     || now - start > max_record_time
//!     || shutdown requested
//! ```
//!
//! `last_speech` moves only when the recognizer reports non-empty interim or
//! final text, so the silence clock runs from the last *decoded* speech, not
//! from the last frame received.  All clocks are wall-clock `Instant`s.

use std::sync::mpsc::TryRecvError;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::audio::{AudioCaptureLoop, CaptureError};
use crate::config::{AssistantConfig, SpeechRecognitionConfig};
use crate::shutdown::ShutdownSignal;
use crate::stt::recognizer::StreamingRecognizer;

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Silence,
    MaxDuration,
    Shutdown,
}

/// Recognized text (possibly empty) and the span of the session.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub stop_reason: StopReason,
}

impl Utterance {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// VoiceActivityRecorder
// ---------------------------------------------------------------------------

pub struct VoiceActivityRecorder {
    recognizer: Box<dyn StreamingRecognizer>,
    silence_timeout: Duration,
    max_record_time: Duration,
    poll_interval: Duration,
    queue_capacity: usize,
}

impl VoiceActivityRecorder {
    pub fn new(
        recognizer: Box<dyn StreamingRecognizer>,
        speech: &SpeechRecognitionConfig,
        assistant: &AssistantConfig,
    ) -> Self {
        Self {
            recognizer,
            silence_timeout: Duration::from_secs_f64(speech.silence_timeout),
            max_record_time: Duration::from_secs_f64(speech.max_record_time),
            poll_interval: Duration::from_millis(assistant.poll_interval_ms),
            // Whisper decodes run on this thread; leave room for frames that
            // arrive meanwhile.
            queue_capacity: 256,
        }
    }

    /// Record until the stop condition holds, then close the stream and
    /// return the final transcript of everything captured.
    ///
    /// # Errors
    ///
    /// Only device errors.  An empty transcript is a normal result.
    pub fn record(
        &mut self,
        capture: &mut AudioCaptureLoop,
        shutdown: &ShutdownSignal,
    ) -> Result<Utterance, CaptureError> {
        self.recognizer.reset();
        let queue = capture.open_queue(self.queue_capacity)?;

        let started_at = Local::now();
        let start = Instant::now();
        let mut last_speech = start;
        let mut speech_started = false;
        let mut audio: Vec<i16> = Vec::new();

        log::info!("recording command");

        let reason = 'poll: loop {
            loop {
                if let Some(reason) = self.stop_reason(start, last_speech, speech_started, shutdown) {
                    break 'poll reason;
                }
                let frame = match queue.try_recv() {
                    Ok(frame) => frame,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        capture.stop_stream();
                        return Err(CaptureError::Disconnected);
                    }
                };

                audio.extend_from_slice(&frame.samples);
                let heard = if self.recognizer.accept(&frame.samples) {
                    self.recognizer.result()
                } else {
                    self.recognizer.partial_result()
                };
                if !heard.trim().is_empty() {
                    log::debug!("hearing: {heard}");
                    last_speech = Instant::now();
                    speech_started = true;
                }
            }

            if let Some(reason) = self.stop_reason(start, last_speech, speech_started, shutdown) {
                break reason;
            }
            std::thread::sleep(self.poll_interval);
        };

        capture.stop_stream();
        log::info!(
            "recording stopped after {:.1} s ({reason:?})",
            start.elapsed().as_secs_f32()
        );

        let text = match reason {
            StopReason::Shutdown => String::new(),
            _ => self.recognizer.final_result(&audio),
        };

        Ok(Utterance {
            text,
            started_at,
            finished_at: Local::now(),
            stop_reason: reason,
        })
    }

    fn stop_reason(
        &self,
        start: Instant,
        last_speech: Instant,
        speech_started: bool,
        shutdown: &ShutdownSignal,
    ) -> Option<StopReason> {
        let now = Instant::now();
        if shutdown.is_requested() {
            Some(StopReason::Shutdown)
        } else if speech_started && now.duration_since(last_speech) > self.silence_timeout {
            Some(StopReason::Silence)
        } else if now.duration_since(start) > self.max_record_time {
            Some(StopReason::MaxDuration)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
