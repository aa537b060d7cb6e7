//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Load [`AppConfig`] (first CLI argument, or the platform settings file;
//!    defaults on first run) and validate it.
//! 2. Initialise console + rotating-file logging.
//! 3. Create the [`tokio`] runtime used for speech output and signal
//!    handling.
//! 4. Load the Whisper model.  A missing or broken model is fatal.
//! 5. Build the capture loop, wake gate, recorder, dispatcher and speech
//!    sequencer.
//! 6. Run the [`Assistant`] on the main thread until Ctrl-C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use voice_assistant::{
    audio::{input_device_names, AudioCaptureLoop, CpalBackend},
    commands::{CommandDispatcher, SystemActions},
    config::{AppConfig, AppPaths},
    logging,
    pipeline::Assistant,
    shutdown::ShutdownSignal,
    stt::{
        SttEngine, TranscribeParams, VoiceActivityRecorder, WhisperEngine,
        WhisperStreamingRecognizer,
    },
    tts::{CliSynthesizer, SpeechOutputSequencer},
    wake::{TranscriptWakeModel, WakeGate},
};

/// Seconds of audio the wake spotter transcribes at a time.
const WAKE_WINDOW_SECS: usize = 2;

fn main() -> anyhow::Result<()> {
    // 1. Configuration
    let paths = AppPaths::new();
    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.settings_file.clone());
    let config = AppConfig::load_from(&settings_path)
        .with_context(|| format!("failed to load {}", settings_path.display()))?;
    config.validate().context("invalid configuration")?;

    // 2. Logging
    match logging::init(&config.logging, &paths) {
        Ok(Some(file)) => log::info!("logging to {}", file.display()),
        Ok(None) => {}
        Err(e) => eprintln!("warning: logger already installed: {e}"),
    }
    log::info!("voice assistant starting (settings: {})", settings_path.display());

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_os_signals(rt.handle());

    // 4. Speech recognition model
    let model_path = paths.model_file(&config.speech_recognition.model);
    let engine: Arc<dyn SttEngine> = Arc::new(
        WhisperEngine::load(
            &model_path,
            TranscribeParams::from_config(&config.speech_recognition),
        )
        .with_context(|| format!("cannot load speech model {}", model_path.display()))?,
    );
    log::info!("Whisper model loaded: {}", model_path.display());

    // 5. Components
    match input_device_names() {
        Ok(names) => {
            for (index, name) in names.iter().enumerate() {
                log::info!("input device {index}: {name}");
            }
        }
        Err(e) => log::warn!("cannot list input devices: {e}"),
    }
    let capture = AudioCaptureLoop::new(Box::new(CpalBackend::new(&config.audio)));

    let spotter = TranscriptWakeModel::new(
        Arc::clone(&engine),
        config.wake_word.model_name.clone(),
        &config.wake_word.wake_phrase(),
        config.audio.sample_rate as usize * WAKE_WINDOW_SECS,
    );
    let gate = WakeGate::new(Box::new(spotter), &config.wake_word);

    let recognizer = WhisperStreamingRecognizer::new(
        Arc::clone(&engine),
        config.audio.sample_rate,
        config.audio.chunk_samples,
    );
    let recorder = VoiceActivityRecorder::new(
        Box::new(recognizer),
        &config.speech_recognition,
        &config.assistant,
    );

    let dispatcher = CommandDispatcher::with_builtins(&config.commands, Box::new(SystemActions));

    let synthesizer =
        CliSynthesizer::new(&config.text_to_speech, &config.speech_recognition.model_language);
    let speech = SpeechOutputSequencer::new(Arc::new(synthesizer), rt.handle().clone());

    // 6. Control loop
    let mut assistant = Assistant::new(
        &config, capture, gate, recorder, dispatcher, speech, shutdown,
    );
    assistant.run();

    log::info!("voice assistant stopped");
    Ok(())
}
