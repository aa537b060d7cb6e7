//! Console and rotating-file logging on top of `env_logger`.
//!
//! Every record is formatted once and written to stderr and, when the log
//! file could be opened, to a size-capped file:
//!
//! ```text
//! 2026-03-02 14:05:11.204 INFO  voice_assistant::pipeline::state state idle → listening_for_command
//! ```
//!
//! Rotation is done by [`file_rotate`]: once the file passes `max_bytes` it
//! becomes `<file>.1`, older backups shift up by one and anything past
//! `<file>.<backups>` is deleted.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use env_logger::{Env, Target, WriteStyle};
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};

use crate::config::{AppPaths, LoggingConfig};

/// Install the global logger.  `RUST_LOG` overrides `config.level`.
///
/// Returns the log file in use, or `None` when only the console is logged
/// to (a warning is printed in that case).
pub fn init(
    config: &LoggingConfig,
    paths: &AppPaths,
) -> Result<Option<PathBuf>, log::SetLoggerError> {
    let path = paths.log_file(&config.file);
    let file = match open_log_file(&path, config.max_bytes, config.backups) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "warning: cannot open log file {}: {e}; logging to console only",
                path.display()
            );
            None
        }
    };
    let active = file.as_ref().map(|_| path.clone());

    env_logger::Builder::from_env(Env::default().default_filter_or(config.level.as_str()))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()?;

    Ok(active)
}

// ---------------------------------------------------------------------------
// Tee
// ---------------------------------------------------------------------------

/// stderr plus an optional log file.  A failing file never silences the
/// console.
struct Tee {
    file: Option<LogFile>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            if file.write_all(buf).is_err() {
                // Stop trying after the first failure.
                self.file = None;
                eprintln!("warning: log file write failed; logging to console only");
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        io::stderr().flush()
    }
}

// ---------------------------------------------------------------------------
// Log file
// ---------------------------------------------------------------------------

type LogFile = FileRotate<AppendCount>;

/// Open `path` for appending with size-based rotation, creating parent
/// directories.  `max_bytes == 0` disables rotation.
///
/// The file is opened once up front so an unwritable location is reported
/// here instead of being swallowed by the rotating writer.
fn open_log_file(path: &Path, max_bytes: u64, backups: usize) -> io::Result<LogFile> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;

    let limit = match usize::try_from(max_bytes) {
        Ok(0) => ContentLimit::None,
        Ok(bytes) => ContentLimit::BytesSurpassed(bytes),
        Err(_) => ContentLimit::None,
    };
    Ok(FileRotate::new(
        path,
        AppendCount::new(backups.max(1)),
        limit,
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
