//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Every section carries
//! `#[serde(default)]`, so a `settings.toml` that only mentions a few keys is
//! completed from the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

/// Upper bound for every configured duration, in seconds.
const MAX_DURATION_SECS: f64 = 3600.0;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors raised while loading, saving or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialise config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the microphone input stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the frames handed to the wake model and recognizer.
    /// Both decode with Whisper, so `validate` only accepts 16000.
    pub sample_rate: u32,
    /// Number of samples per frame (1280 = 80 ms at 16 kHz).
    pub chunk_samples: usize,
    /// Index into the host's input device list.  `None` = system default.
    pub device_index: Option<usize>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_samples: 1280,
            device_index: None,
        }
    }
}

// ---------------------------------------------------------------------------
// WakeWordConfig
// ---------------------------------------------------------------------------

/// Settings for wake-phrase gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    /// Key the wake model reports its confidence under.
    pub model_name: String,
    /// Detection fires when the confidence is strictly greater than this.
    pub threshold: f32,
    /// Detections are suppressed for this long after a positive detection.
    pub cooldown_seconds: f64,
    /// Frames read and discarded between the wake stream and the command
    /// stream.
    pub buffer_clear_chunks: usize,
    /// Spoken wake phrase.  `None` derives it from `model_name`
    /// (`"hey_jarvis"` → `"hey jarvis"`).
    pub phrase: Option<String>,
    /// Short prompt spoken before recording starts.  Empty disables it.
    pub acknowledgement: String,
}

impl WakeWordConfig {
    /// The phrase the spotter listens for.
    pub fn wake_phrase(&self) -> String {
        self.phrase
            .clone()
            .unwrap_or_else(|| self.model_name.replace('_', " "))
    }
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            model_name: "hey_jarvis".into(),
            threshold: 0.5,
            cooldown_seconds: 4.0,
            buffer_clear_chunks: 15,
            phrase: None,
            acknowledgement: "Ja?".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechRecognitionConfig
// ---------------------------------------------------------------------------

/// Settings for command recording and transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechRecognitionConfig {
    /// ISO-639-1 language code passed to the recognizer.
    pub model_language: String,
    /// Seconds of decoded silence (after speech began) that end a recording.
    pub silence_timeout: f64,
    /// Hard ceiling on a recording in seconds.
    pub max_record_time: f64,
    /// GGML model file stem (`"base"` → `ggml-base.bin`).
    pub model: String,
}

impl Default for SpeechRecognitionConfig {
    fn default() -> Self {
        Self {
            model_language: "de".into(),
            silence_timeout: 2.0,
            max_record_time: 30.0,
            model: "base".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TextToSpeechConfig
// ---------------------------------------------------------------------------

/// External TTS program used to render speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtsEngineKind {
    /// `edge-tts` CLI (neural voices, writes MP3).
    #[serde(rename = "edge-tts")]
    EdgeTts,
    /// `espeak-ng` CLI (offline, writes WAV).
    #[serde(rename = "espeak-ng")]
    EspeakNg,
}

impl Default for TtsEngineKind {
    fn default() -> Self {
        Self::EdgeTts
    }
}

/// Settings for spoken output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextToSpeechConfig {
    /// Voice identifier understood by the selected engine.
    pub voice: String,
    /// Which TTS program renders the audio.
    pub engine: TtsEngineKind,
    /// Spoken once at startup.  Empty disables it.
    pub greeting: String,
    /// Spoken during shutdown.  Empty disables it.
    pub farewell: String,
}

impl Default for TextToSpeechConfig {
    fn default() -> Self {
        Self {
            voice: "de-DE-KatjaNeural".into(),
            engine: TtsEngineKind::default(),
            greeting: "System bereit".into(),
            farewell: "Auf Wiedersehen".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingConfig
// ---------------------------------------------------------------------------

/// Log level and rotating log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter (`error`, `warn`, `info`, `debug`, `trace`).
    /// `RUST_LOG` takes precedence.
    pub level: String,
    /// Log file; relative paths resolve under the data directory.
    pub file: PathBuf,
    /// Size at which the file is rotated.  `0` disables rotation.
    pub max_bytes: u64,
    /// Number of rotated files kept (`file.1` … `file.N`).  At least one
    /// is kept when rotation is on.
    pub backups: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: PathBuf::from("voice_assistant.log"),
            max_bytes: 10_485_760,
            backups: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandsConfig
// ---------------------------------------------------------------------------

/// Which built-in command groups are registered, and the programs they start.
///
/// Program strings are split on whitespace: the first word is the
/// executable, the rest are arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub enable_system_commands: bool,
    pub enable_web_commands: bool,
    pub calculator: String,
    pub editor: String,
    pub file_manager: String,
    pub browser: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        let (calculator, editor, file_manager, browser) = if cfg!(windows) {
            ("calc.exe", "notepad.exe", "explorer.exe", "firefox.exe")
        } else if cfg!(target_os = "macos") {
            (
                "open -a Calculator",
                "open -a TextEdit",
                "open .",
                "open -a Firefox",
            )
        } else {
            ("gnome-calculator", "gedit", "xdg-open .", "firefox")
        };

        Self {
            enable_system_commands: true,
            enable_web_commands: true,
            calculator: calculator.into(),
            editor: editor.into(),
            file_manager: file_manager.into(),
            browser: browser.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AssistantConfig
// ---------------------------------------------------------------------------

/// Control-loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Poll tick of the control loop in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of transitions kept for diagnostics.
    pub transition_history: usize,
    /// Number of exchanges kept in the in-memory conversation log.
    pub conversation_log: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            transition_history: 100,
            conversation_log: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_assistant::config::AppConfig;
///
/// let config = AppConfig::load().unwrap();
/// let threshold = config.get("wake_word.threshold");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub wake_word: WakeWordConfig,
    pub speech_recognition: SpeechRecognitionConfig,
    pub text_to_speech: TextToSpeechConfig,
    pub logging: LoggingConfig,
    pub commands: CommandsConfig,
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    /// Look up a value by dot-path key, e.g. `"speech_recognition.silence_timeout"`.
    ///
    /// Returns `None` for unknown keys and for optional values that are unset.
    pub fn get(&self, key: &str) -> Option<toml::Value> {
        let root = toml::Value::try_from(self).ok()?;
        key.split('.').try_fold(root, |value, part| match value {
            toml::Value::Table(mut table) => table.remove(part),
            _ => None,
        })
    }

    /// Reject values the control loop cannot work with.  Durations must be
    /// finite and at most an hour so they convert to [`std::time::Duration`]
    /// and can be added to an `Instant`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, reason: &str| {
            Err(ConfigError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };

        if self.audio.sample_rate as usize != crate::stt::SAMPLE_RATE {
            return invalid(
                "audio.sample_rate",
                "must be 16000; the recognizer and wake spotter decode 16 kHz audio",
            );
        }
        if self.audio.chunk_samples == 0 {
            return invalid("audio.chunk_samples", "must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.wake_word.threshold) {
            return invalid("wake_word.threshold", "must be within 0.0..=1.0");
        }
        if !(0.0..=MAX_DURATION_SECS).contains(&self.wake_word.cooldown_seconds) {
            return invalid("wake_word.cooldown_seconds", "must be within 0..=3600 seconds");
        }
        let timeouts = [
            (
                "speech_recognition.silence_timeout",
                self.speech_recognition.silence_timeout,
            ),
            (
                "speech_recognition.max_record_time",
                self.speech_recognition.max_record_time,
            ),
        ];
        for (key, seconds) in timeouts {
            if !(seconds > 0.0 && seconds <= MAX_DURATION_SECS) {
                return invalid(key, "must be within 0..=3600 seconds and not zero");
            }
        }
        if self.assistant.poll_interval_ms == 0 {
            return invalid("assistant.poll_interval_ms", "must be greater than zero");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
