//! The assistant's control loop.
//!
//! [`Assistant`] owns every subsystem and drives them from a single thread on
//! a fixed poll tick.  Each tick it runs the handler for the current state,
//! which returns the state to move to next:
//!
//! ```text
//! Idle ──wake──► ListeningForCommand ──utterance──► ProcessingCommand
//!  ▲                (purge, "Ja?", record)            │          │
//!  │                                              response    empty text
//!  │                                                  ▼          │
//!  └──────────── Cooldown ◄──────────────────────── Speaking     │
//!                   ▲                                            │
//!                   └────────────────────────────────────────────┘
//! ```
//!
//! Only Idle and ListeningForCommand touch the microphone, and each closes
//! its stream before handing over, so at most one stream is ever live.
//! Device errors abandon the current attempt and return to Idle; a panicking
//! handler moves the machine to Error, whose handler closes any stream and
//! returns to Idle.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::TryRecvError;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audio::{AudioCaptureLoop, CaptureError, FrameQueue};
use crate::commands::CommandDispatcher;
use crate::config::AppConfig;
use crate::shutdown::ShutdownSignal;
use crate::stt::{Utterance, VoiceActivityRecorder};
use crate::tts::SpeechOutputSequencer;
use crate::wake::WakeGate;

use super::history::ConversationLog;
use super::state::{AssistantState, StateMachine};

/// Frames buffered between the audio thread and the wake gate.
const WAKE_QUEUE_FRAMES: usize = 64;
/// Longest wait for a single frame while purging stale audio.
const DRAIN_FRAME_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause before reopening a microphone that failed in Idle.
const DEVICE_RETRY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// AssistantError
// ---------------------------------------------------------------------------

/// Failures a state handler can report to the loop.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The attempt is abandoned and the loop returns to Idle.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("handler for state {0} panicked")]
    Panicked(AssistantState),
}

// ---------------------------------------------------------------------------
// LoopSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LoopSettings {
    poll_interval: Duration,
    cooldown: Duration,
    buffer_clear_chunks: usize,
    greeting: String,
    acknowledgement: String,
    farewell: String,
}

impl LoopSettings {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.assistant.poll_interval_ms),
            cooldown: Duration::from_secs_f64(config.wake_word.cooldown_seconds),
            buffer_clear_chunks: config.wake_word.buffer_clear_chunks,
            greeting: config.text_to_speech.greeting.clone(),
            acknowledgement: config.wake_word.acknowledgement.clone(),
            farewell: config.text_to_speech.farewell.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

/// Wake → record → dispatch → speak, until shutdown is requested.
///
/// ```rust,no_run
/// # use voice_assistant::audio::AudioCaptureLoop;
/// # use voice_assistant::commands::CommandDispatcher;
/// # use voice_assistant::config::AppConfig;
/// # use voice_assistant::pipeline::Assistant;
/// # use voice_assistant::shutdown::ShutdownSignal;
/// # use voice_assistant::stt::VoiceActivityRecorder;
/// # use voice_assistant::tts::SpeechOutputSequencer;
/// # use voice_assistant::wake::WakeGate;
/// # fn parts() -> (AudioCaptureLoop, WakeGate, VoiceActivityRecorder, CommandDispatcher, SpeechOutputSequencer) { unimplemented!() }
/// let config = AppConfig::default();
/// let (capture, gate, recorder, dispatcher, speech) = parts();
/// let shutdown = ShutdownSignal::new();
///
/// let mut assistant =
///     Assistant::new(&config, capture, gate, recorder, dispatcher, speech, shutdown);
/// assistant.run();
/// ```
pub struct Assistant {
    machine: StateMachine,
    capture: AudioCaptureLoop,
    gate: WakeGate,
    recorder: VoiceActivityRecorder,
    dispatcher: CommandDispatcher,
    speech: SpeechOutputSequencer,
    conversation: ConversationLog,
    shutdown: ShutdownSignal,
    settings: LoopSettings,
    /// Live only while Idle is listening for the wake phrase.
    wake_queue: Option<FrameQueue>,
    pending_utterance: Option<Utterance>,
    pending_response: Option<String>,
}

impl Assistant {
    pub fn new(
        config: &AppConfig,
        capture: AudioCaptureLoop,
        gate: WakeGate,
        recorder: VoiceActivityRecorder,
        dispatcher: CommandDispatcher,
        speech: SpeechOutputSequencer,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            machine: StateMachine::new(config.assistant.transition_history),
            capture,
            gate,
            recorder,
            dispatcher,
            speech,
            conversation: ConversationLog::new(config.assistant.conversation_log),
            shutdown,
            settings: LoopSettings::from_config(config),
            wake_queue: None,
            pending_utterance: None,
            pending_response: None,
        }
    }

    pub fn state(&self) -> AssistantState {
        self.machine.current()
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    /// For registering transition observers before [`Assistant::run`].
    pub fn state_machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }

    /// Run until the shutdown signal is raised.  Returns in
    /// [`AssistantState::Shutdown`] with no stream open.
    ///
    /// Blocks the calling thread; speech output is awaited on the runtime
    /// the [`SpeechOutputSequencer`] was built with, so this must not be
    /// called from inside that runtime.
    pub fn run(&mut self) {
        log::info!("assistant running");
        self.say(&self.settings.greeting);

        while !self.machine.current().is_terminal() {
            if self.shutdown.is_requested() {
                self.shut_down();
                break;
            }

            let state = self.machine.current();
            let next = match catch_unwind(AssertUnwindSafe(|| self.step(state))) {
                Ok(Ok(next)) => next,
                Ok(Err(e)) => self.recover(state, e),
                Err(_) => self.recover(state, AssistantError::Panicked(state)),
            };
            if next != state {
                self.advance(next);
            }

            std::thread::sleep(self.settings.poll_interval);
        }
    }

    fn step(&mut self, state: AssistantState) -> Result<AssistantState, AssistantError> {
        match state {
            AssistantState::Idle => self.handle_idle(),
            AssistantState::ListeningForCommand => self.handle_listening(),
            AssistantState::ProcessingCommand => Ok(self.handle_processing()),
            AssistantState::Speaking => Ok(self.handle_speaking()),
            AssistantState::Cooldown => Ok(self.handle_cooldown()),
            AssistantState::Error => Ok(self.handle_error()),
            AssistantState::Shutdown => Ok(AssistantState::Shutdown),
        }
    }

    // -----------------------------------------------------------------------
    // State handlers
    // -----------------------------------------------------------------------

    /// Feed queued frames to the wake gate.  The stream stays open across
    /// ticks until the wake phrase is heard.
    fn handle_idle(&mut self) -> Result<AssistantState, AssistantError> {
        if self.gate.is_paused() {
            self.gate.resume();
        }

        let queue = match self.wake_queue.take() {
            Some(queue) => queue,
            None => {
                self.capture.stop_stream();
                self.capture.open_queue(WAKE_QUEUE_FRAMES)?
            }
        };

        loop {
            match queue.try_recv() {
                Ok(frame) => {
                    if self.gate.detect(&frame.samples).detected {
                        self.capture.stop_stream();
                        return Ok(AssistantState::ListeningForCommand);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.capture.stop_stream();
                    return Err(CaptureError::Disconnected.into());
                }
            }
        }

        self.wake_queue = Some(queue);
        Ok(AssistantState::Idle)
    }

    fn handle_listening(&mut self) -> Result<AssistantState, AssistantError> {
        self.gate.pause();
        self.capture.drain(
            self.settings.buffer_clear_chunks,
            DRAIN_FRAME_TIMEOUT,
            &self.shutdown,
        )?;
        if self.shutdown.is_requested() {
            return Ok(AssistantState::Idle);
        }
        self.say(&self.settings.acknowledgement);

        let utterance = self.recorder.record(&mut self.capture, &self.shutdown)?;
        if utterance.is_empty() {
            log::warn!("no command recognized");
        } else {
            log::info!("recognized: '{}'", utterance.text);
        }
        self.pending_utterance = Some(utterance);
        Ok(AssistantState::ProcessingCommand)
    }

    fn handle_processing(&mut self) -> AssistantState {
        let Some(utterance) = self.pending_utterance.take() else {
            return AssistantState::Idle;
        };
        if utterance.is_empty() {
            return AssistantState::Cooldown;
        }

        let dispatch = self.dispatcher.respond(&utterance.text);
        self.conversation
            .record(&utterance.text, dispatch.command.as_deref(), &dispatch.response);
        self.pending_response = Some(dispatch.response);
        AssistantState::Speaking
    }

    fn handle_speaking(&mut self) -> AssistantState {
        if let Some(response) = self.pending_response.take() {
            self.say(&response);
        }
        AssistantState::Cooldown
    }

    fn handle_cooldown(&mut self) -> AssistantState {
        log::info!("cooling down for {:.1} s", self.settings.cooldown.as_secs_f32());
        self.pause_for(self.settings.cooldown);
        self.gate.resume();
        AssistantState::Idle
    }

    fn handle_error(&mut self) -> AssistantState {
        self.wake_queue = None;
        self.capture.stop_stream();
        self.pending_utterance = None;
        self.pending_response = None;
        AssistantState::Idle
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn recover(&mut self, state: AssistantState, error: AssistantError) -> AssistantState {
        log::error!("{state}: {error}");
        match error {
            AssistantError::Capture(_) => {
                self.wake_queue = None;
                self.capture.stop_stream();
                if state == AssistantState::Idle {
                    self.pause_for(DEVICE_RETRY);
                }
                AssistantState::Idle
            }
            AssistantError::Panicked(AssistantState::Error) => AssistantState::Idle,
            AssistantError::Panicked(_) => AssistantState::Error,
        }
    }

    fn advance(&mut self, next: AssistantState) {
        if !self.machine.transition(next) && self.machine.can_transition(AssistantState::Error) {
            self.machine.transition(AssistantState::Error);
        }
    }

    fn shut_down(&mut self) {
        log::info!("shutting down from {}", self.machine.current());
        self.wake_queue = None;
        self.capture.stop_stream();
        self.pending_utterance = None;
        self.pending_response = None;

        if !self.machine.can_transition(AssistantState::Shutdown) {
            self.machine.transition(AssistantState::Idle);
        }
        self.say(&self.settings.farewell);
        self.machine.transition(AssistantState::Shutdown);

        let dropped = self.capture.dropped_frames();
        if dropped > 0 {
            log::debug!("{dropped} audio frames were dropped on a full queue");
        }
    }

    fn say(&self, text: &str) {
        if let Err(e) = self.speech.speak(text) {
            log::error!("speech output failed: {e}");
        }
    }

    /// Sleep for `duration` in poll ticks, returning early on shutdown.
    fn pause_for(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.shutdown.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(self.settings.poll_interval.min(deadline - now));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::audio::AudioBackend;
    use crate::commands::NOT_RECOGNIZED;
    use crate::stt::StreamingRecognizer;
    use crate::testing::{
        BackendProbe, RecordingActions, RecordingSynthesizer, ScriptedBackend, ScriptedRecognizer,
        ScriptedWakeModel,
    };
    use AssistantState::*;

    struct Rig {
        assistant: Assistant,
        speech: RecordingSynthesizer,
        actions: RecordingActions,
        probe: BackendProbe,
        shutdown: ShutdownSignal,
        // Dropped last: the sequencer blocks on this runtime.
        _runtime: tokio::runtime::Runtime,
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.wake_word.cooldown_seconds = 0.2;
        config.wake_word.buffer_clear_chunks = 3;
        config.speech_recognition.silence_timeout = 0.1;
        config.speech_recognition.max_record_time = 2.0;
        config.assistant.poll_interval_ms = 5;
        config
    }

    fn rig(
        config: &AppConfig,
        backend: ScriptedBackend,
        wake: ScriptedWakeModel,
        recognizer: Box<dyn StreamingRecognizer>,
    ) -> Rig {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let speech = RecordingSynthesizer::default();
        let actions = RecordingActions::default();
        let probe = backend.probe();
        let shutdown = ShutdownSignal::new();

        let backend: Box<dyn AudioBackend> = Box::new(backend);
        let assistant = Assistant::new(
            config,
            AudioCaptureLoop::new(backend),
            WakeGate::new(Box::new(wake), &config.wake_word),
            VoiceActivityRecorder::new(recognizer, &config.speech_recognition, &config.assistant),
            CommandDispatcher::with_builtins(&config.commands, Box::new(actions.clone())),
            SpeechOutputSequencer::new(Arc::new(speech.clone()), runtime.handle().clone()),
            shutdown.clone(),
        );

        Rig {
            assistant,
            speech,
            actions,
            probe,
            shutdown,
            _runtime: runtime,
        }
    }

    /// Request shutdown the first time Idle is entered from `from`.
    fn stop_after_return_from(rig: &mut Rig, from: AssistantState) {
        let signal = rig.shutdown.clone();
        rig.assistant
            .state_machine_mut()
            .on_state_change(Idle, move |event| {
                if event.from == from {
                    signal.request();
                }
                Ok(())
            });
    }

    fn visited(assistant: &Assistant) -> Vec<AssistantState> {
        assistant.state_machine().history().map(|e| e.to).collect()
    }

    #[test]
    fn wake_command_response_cycle() {
        let config = test_config();
        let mut rig = rig(
            &config,
            ScriptedBackend::new(1280),
            ScriptedWakeModel::sequence("hey_jarvis", vec![0.9, 0.0]),
            Box::new(ScriptedRecognizer::speaking_for(3, "öffne den taschenrechner")),
        );
        stop_after_return_from(&mut rig, Cooldown);

        rig.assistant.run();

        assert_eq!(
            visited(&rig.assistant),
            [ListeningForCommand, ProcessingCommand, Speaking, Cooldown, Idle, Shutdown]
        );
        assert_eq!(
            rig.speech.spoken(),
            ["System bereit", "Ja?", "Öffne den Taschenrechner", "Auf Wiedersehen"]
        );
        assert_eq!(rig.actions.launched(), [config.commands.calculator.clone()]);

        let exchange = rig.assistant.conversation().last().expect("exchange logged");
        assert_eq!(exchange.heard, "öffne den taschenrechner");
        assert_eq!(exchange.command.as_deref(), Some("calculator"));

        let history: Vec<_> = rig.assistant.state_machine().history().cloned().collect();
        let cooldown = (history[4].timestamp - history[3].timestamp).num_milliseconds();
        assert!(cooldown >= 200, "cooldown lasted {cooldown} ms");

        assert_eq!(rig.probe.max_live(), 1);
        assert_eq!(rig.probe.live(), 0);
    }

    #[test]
    fn empty_recognition_goes_straight_to_cooldown() {
        let config = test_config();
        let mut rig = rig(
            &config,
            ScriptedBackend::new(1280),
            ScriptedWakeModel::sequence("hey_jarvis", vec![0.9, 0.0]),
            Box::new(ScriptedRecognizer::silent()),
        );
        stop_after_return_from(&mut rig, Cooldown);

        rig.assistant.run();

        assert_eq!(
            visited(&rig.assistant),
            [ListeningForCommand, ProcessingCommand, Cooldown, Idle, Shutdown]
        );
        assert_eq!(rig.speech.spoken(), ["System bereit", "Ja?", "Auf Wiedersehen"]);
        assert!(rig.assistant.conversation().is_empty());
        assert_eq!(rig.probe.max_live(), 1);
    }

    #[test]
    fn unknown_command_is_answered_not_recognized() {
        let config = test_config();
        let mut rig = rig(
            &config,
            ScriptedBackend::new(1280),
            ScriptedWakeModel::sequence("hey_jarvis", vec![0.9, 0.0]),
            Box::new(ScriptedRecognizer::speaking_for(3, "spiel etwas musik")),
        );
        stop_after_return_from(&mut rig, Cooldown);

        rig.assistant.run();

        assert!(rig.speech.spoken().contains(&NOT_RECOGNIZED.to_string()));
        let exchange = rig.assistant.conversation().last().unwrap();
        assert_eq!(exchange.command, None);
        assert!(rig.actions.launched().is_empty());
    }

    #[test]
    fn shutdown_before_start_still_greets_and_says_goodbye() {
        let config = test_config();
        let mut rig = rig(
            &config,
            ScriptedBackend::new(1280),
            ScriptedWakeModel::constant("hey_jarvis", 0.0),
            Box::new(ScriptedRecognizer::silent()),
        );
        rig.shutdown.request();

        rig.assistant.run();

        assert_eq!(rig.assistant.state(), Shutdown);
        assert_eq!(visited(&rig.assistant), [Shutdown]);
        assert_eq!(rig.speech.spoken(), ["System bereit", "Auf Wiedersehen"]);
        assert_eq!(rig.probe.opened(), 0);
    }

    #[test]
    fn missing_microphone_keeps_the_loop_alive() {
        let config = test_config();
        let mut rig = rig(
            &config,
            ScriptedBackend::new(1280).failing(),
            ScriptedWakeModel::constant("hey_jarvis", 0.9),
            Box::new(ScriptedRecognizer::silent()),
        );
        let signal = rig.shutdown.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            signal.request();
        });

        let start = Instant::now();
        rig.assistant.run();
        stopper.join().unwrap();

        assert_eq!(rig.assistant.state(), Shutdown);
        assert_eq!(visited(&rig.assistant), [Shutdown]);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(rig.probe.live(), 0);
    }

    /// Panics on the first frame it is fed.
    struct ExplodingRecognizer;

    impl StreamingRecognizer for ExplodingRecognizer {
        fn reset(&mut self) {}
        fn accept(&mut self, _frame: &[i16]) -> bool {
            panic!("decoder crashed")
        }
        fn result(&mut self) -> String {
            String::new()
        }
        fn partial_result(&self) -> String {
            String::new()
        }
        fn final_result(&mut self, _audio: &[i16]) -> String {
            String::new()
        }
    }

    #[test]
    fn panicking_handler_recovers_through_error_state() {
        let config = test_config();
        let mut rig = rig(
            &config,
            ScriptedBackend::new(1280),
            ScriptedWakeModel::sequence("hey_jarvis", vec![0.9, 0.0]),
            Box::new(ExplodingRecognizer),
        );
        stop_after_return_from(&mut rig, Error);

        rig.assistant.run();

        assert_eq!(
            visited(&rig.assistant),
            [ListeningForCommand, Error, Idle, Shutdown]
        );
        assert_eq!(rig.probe.live(), 0);
        assert_eq!(rig.probe.max_live(), 1);
    }
}
