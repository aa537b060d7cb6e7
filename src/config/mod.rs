//! Configuration module for the voice assistant.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per subsystem,
//! `AppPaths` for cross-platform data directories, TOML persistence via
//! `AppConfig::load_from` / `AppConfig::save_to`, and dot-path lookup via
//! `AppConfig::get`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AssistantConfig, AudioConfig, CommandsConfig, ConfigError, LoggingConfig,
    SpeechRecognitionConfig, TextToSpeechConfig, TtsEngineKind, WakeWordConfig,
};
