//! Speech synthesis through an external TTS program.
//!
//! The program writes its audio to a temporary file, which is played with
//! [`play_file`] and removed afterwards on every path, success or not.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use super::{play_file, SpeechSynthesizer, TtsError};
use crate::config::{TextToSpeechConfig, TtsEngineKind};

const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CliSynthesizer {
    engine: TtsEngineKind,
    program: String,
    voice: String,
    language: String,
    temp_dir: Option<PathBuf>,
}

impl CliSynthesizer {
    /// `language` is the ISO code espeak-ng falls back to, since it does not
    /// understand edge-tts voice names.
    pub fn new(config: &TextToSpeechConfig, language: &str) -> Self {
        let program = match config.engine {
            TtsEngineKind::EdgeTts => "edge-tts",
            TtsEngineKind::EspeakNg => "espeak-ng",
        };
        Self {
            engine: config.engine,
            program: program.to_string(),
            voice: config.voice.clone(),
            language: language.to_string(),
            temp_dir: None,
        }
    }

    /// Run a different executable with the same arguments.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Create temporary files in `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn args(&self, text: &str, out: &Path) -> Vec<String> {
        let out = out.display().to_string();
        match self.engine {
            TtsEngineKind::EdgeTts => vec![
                "--voice".into(),
                self.voice.clone(),
                "--text".into(),
                text.into(),
                "--write-media".into(),
                out,
            ],
            TtsEngineKind::EspeakNg => vec![
                "-v".into(),
                self.language.clone(),
                "-w".into(),
                out,
                text.into(),
            ],
        }
    }

    fn suffix(&self) -> &'static str {
        match self.engine {
            TtsEngineKind::EdgeTts => ".mp3",
            TtsEngineKind::EspeakNg => ".wav",
        }
    }

    async fn render(&self, text: &str, out: &Path) -> Result<(), TtsError> {
        let child = Command::new(&self.program)
            .args(self.args(text, out))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => TtsError::EngineMissing(self.program.clone()),
                _ => TtsError::Spawn(e),
            })?;

        let output = timeout(SYNTHESIS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| TtsError::Timeout(SYNTHESIS_TIMEOUT))?
            .map_err(TtsError::Spawn)?;

        if !output.status.success() {
            return Err(TtsError::Synthesis {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn render_and_play(&self, text: &str, out: &Path) -> Result<(), TtsError> {
        self.render(text, out).await?;
        let path = out.to_path_buf();
        tokio::task::spawn_blocking(move || play_file(&path))
            .await
            .map_err(|e| TtsError::Playback {
                path: out.to_path_buf(),
                reason: e.to_string(),
            })?
    }
}

#[async_trait]
impl SpeechSynthesizer for CliSynthesizer {
    async fn synthesize_and_play(&self, text: &str) -> Result<(), TtsError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("voice-assistant-").suffix(self.suffix());
        let temp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(TtsError::TempFile)?;

        let path = temp.path().to_path_buf();
        let outcome = self.render_and_play(text, &path).await;

        if let Err(e) = temp.close() {
            log::warn!(
                "could not remove temporary speech file {}: {e}",
                path.display()
            );
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn synth(engine: TtsEngineKind) -> CliSynthesizer {
        let config = TextToSpeechConfig {
            engine,
            ..TextToSpeechConfig::default()
        };
        CliSynthesizer::new(&config, "de")
    }

    #[test]
    fn edge_tts_arguments() {
        let args = synth(TtsEngineKind::EdgeTts).args("Hallo", Path::new("/tmp/x.mp3"));
        assert_eq!(
            args,
            [
                "--voice",
                "de-DE-KatjaNeural",
                "--text",
                "Hallo",
                "--write-media",
                "/tmp/x.mp3"
            ]
        );
    }

    #[test]
    fn espeak_uses_language_code() {
        let s = synth(TtsEngineKind::EspeakNg);
        assert_eq!(s.args("Hallo", Path::new("/tmp/x.wav")), ["-v", "de", "-w", "/tmp/x.wav", "Hallo"]);
        assert_eq!(s.suffix(), ".wav");
    }

    #[tokio::test]
    async fn missing_program_reports_engine_missing_and_cleans_up() {
        let dir = tempdir().unwrap();
        let s = synth(TtsEngineKind::EdgeTts)
            .with_program("definitely-not-a-tts-program")
            .with_temp_dir(dir.path());

        let err = s.synthesize_and_play("Hallo").await.unwrap_err();
        assert!(matches!(err, TtsError::EngineMissing(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_reports_synthesis_error_and_cleans_up() {
        let dir = tempdir().unwrap();
        let s = synth(TtsEngineKind::EdgeTts)
            .with_program("false")
            .with_temp_dir(dir.path());

        let err = s.synthesize_and_play("Hallo").await.unwrap_err();
        assert!(matches!(err, TtsError::Synthesis { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unplayable_output_still_cleans_up() {
        let dir = tempdir().unwrap();
        // `true` succeeds without writing audio, so playback must fail.
        let s = synth(TtsEngineKind::EdgeTts)
            .with_program("true")
            .with_temp_dir(dir.path());

        let err = s.synthesize_and_play("Hallo").await.unwrap_err();
        assert!(matches!(err, TtsError::Playback { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
