//! Scripted stand-ins for the device, model and process boundaries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::audio::{AudioBackend, AudioFrame, CaptureError, FrameConsumer, StreamHandle};
use crate::commands::{ActionRunner, CommandError};
use crate::stt::StreamingRecognizer;
use crate::tts::{SpeechSynthesizer, TtsError};
use crate::wake::{WakeError, WakeWordModel};

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

const FRAME_PERIOD: Duration = Duration::from_millis(2);

/// Counters shared between a [`ScriptedBackend`] and the test.
#[derive(Debug, Clone, Default)]
pub struct BackendProbe {
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
}

impl BackendProbe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

/// Emits silent 16 kHz frames from a worker thread every couple of
/// milliseconds while a stream is open.
pub struct ScriptedBackend {
    chunk: usize,
    fail: bool,
    stalled: bool,
    probe: BackendProbe,
}

impl ScriptedBackend {
    pub fn new(chunk: usize) -> Self {
        Self {
            chunk,
            fail: false,
            stalled: false,
            probe: BackendProbe::default(),
        }
    }

    /// Every `open` fails with [`CaptureError::NoDevice`].
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Streams open normally but never deliver a frame.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn probe(&self) -> BackendProbe {
        self.probe.clone()
    }
}

struct ScriptedStream {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AudioBackend for ScriptedBackend {
    fn open(&self, mut consumer: FrameConsumer) -> Result<StreamHandle, CaptureError> {
        if self.fail {
            return Err(CaptureError::NoDevice);
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        let now_live = self.probe.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_live.fetch_max(now_live, Ordering::SeqCst);

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let delivered = Arc::clone(&self.probe.delivered);
        let chunk = self.chunk;
        let stalled = self.stalled;
        let worker = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                if stalled {
                    std::thread::sleep(FRAME_PERIOD);
                    continue;
                }
                consumer(AudioFrame {
                    samples: vec![0; chunk],
                    sample_rate: 16_000,
                });
                delivered.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(FRAME_PERIOD);
            }
        });

        Ok(StreamHandle::new(ScriptedStream {
            stop,
            worker: Some(worker),
            live: Arc::clone(&self.probe.live),
        }))
    }
}

// ---------------------------------------------------------------------------
// Wake model
// ---------------------------------------------------------------------------

/// Reports a scripted confidence for one model name.
pub struct ScriptedWakeModel {
    name: String,
    scores: Vec<f32>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl ScriptedWakeModel {
    pub fn constant(name: &str, confidence: f32) -> Self {
        Self::sequence(name, vec![confidence])
    }

    /// Scores in order, then the last one forever.
    pub fn sequence(name: &str, scores: Vec<f32>) -> Self {
        Self {
            name: name.to_string(),
            scores,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::sequence("hey_jarvis", vec![0.0])
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl WakeWordModel for ScriptedWakeModel {
    fn predict(&mut self, _frame: &[i16]) -> Result<HashMap<String, f32>, WakeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WakeError::Inference("scripted failure".into()));
        }
        let score = self
            .scores
            .get(call)
            .or(self.scores.last())
            .copied()
            .unwrap_or(0.0);
        Ok(HashMap::from([(self.name.clone(), score)]))
    }
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

/// Reports `text` as partial output for the first `frames` frames it
/// accepts and silence afterwards.
pub struct ScriptedRecognizer {
    text: String,
    frames: usize,
    accepted: Arc<AtomicUsize>,
    last_heard: Arc<Mutex<Option<Instant>>>,
}

impl ScriptedRecognizer {
    pub fn silent() -> Self {
        Self::speaking_for(0, "")
    }

    pub fn speaking_for(frames: usize, text: &str) -> Self {
        Self {
            text: text.to_string(),
            frames,
            accepted: Arc::new(AtomicUsize::new(0)),
            last_heard: Arc::new(Mutex::new(None)),
        }
    }

    pub fn accepted_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.accepted)
    }

    /// When non-empty partial text was last handed out.
    pub fn last_heard(&self) -> Arc<Mutex<Option<Instant>>> {
        Arc::clone(&self.last_heard)
    }
}

impl StreamingRecognizer for ScriptedRecognizer {
    fn reset(&mut self) {
        self.accepted.store(0, Ordering::SeqCst);
    }

    fn accept(&mut self, _frame: &[i16]) -> bool {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        false
    }

    fn result(&mut self) -> String {
        String::new()
    }

    fn partial_result(&self) -> String {
        let accepted = self.accepted.load(Ordering::SeqCst);
        if accepted > 0 && accepted <= self.frames {
            *self.last_heard.lock().unwrap() = Some(Instant::now());
            self.text.clone()
        } else {
            String::new()
        }
    }

    fn final_result(&mut self, _audio: &[i16]) -> String {
        if self.frames > 0 {
            self.text.clone()
        } else {
            String::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Speech output
// ---------------------------------------------------------------------------

/// Remembers what it was asked to say.
#[derive(Debug, Clone, Default)]
pub struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    fail: bool,
}

impl RecordingSynthesizer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn synthesize_and_play(&self, text: &str) -> Result<(), TtsError> {
        if self.fail {
            return Err(TtsError::EngineMissing("scripted-tts".into()));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Records launches and URLs instead of spawning processes.
#[derive(Debug, Clone, Default)]
pub struct RecordingActions {
    launched: Arc<Mutex<Vec<String>>>,
    opened: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingActions {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl ActionRunner for RecordingActions {
    fn launch(&self, program: &str) -> Result<(), CommandError> {
        if self.fail {
            return Err(CommandError::Launch {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
            });
        }
        self.launched.lock().unwrap().push(program.to_string());
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<(), CommandError> {
        if self.fail {
            return Err(CommandError::OpenUrl {
                url: url.to_string(),
                reason: "scripted failure".into(),
            });
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
