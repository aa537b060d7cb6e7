//! Blocking audio-file playback through `rodio`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::TtsError;

/// Play `path` (WAV or MP3) on the default output device and return when
/// playback has finished.
///
/// Blocks the calling thread; run it under `spawn_blocking` from async code.
pub fn play_file(path: &Path) -> Result<(), TtsError> {
    let fail = |reason: String| TtsError::Playback {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| fail(format!("cannot open file: {e}")))?;
    let reader = BufReader::new(file);

    let device_sink = rodio::DeviceSinkBuilder::from_default_device()
        .map_err(|e| fail(format!("no default output device: {e}")))?
        .open_sink_or_fallback()
        .map_err(|e| fail(format!("cannot open output device: {e}")))?;

    let player = rodio::play(device_sink.mixer(), reader)
        .map_err(|e| fail(format!("cannot decode audio: {e}")))?;

    player.sleep_until_end();
    drop(device_sink);
    log::debug!("played {}", path.display());
    Ok(())
}
