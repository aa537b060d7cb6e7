//! Side effects commands may trigger.

use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use super::CommandError;

/// Capability handed to [`super::Command::execute`].
pub trait ActionRunner {
    /// Start `program` detached.  The string is split on whitespace: the first
    /// word is the executable, the rest are its arguments.
    fn launch(&self, program: &str) -> Result<(), CommandError>;

    /// Open `url` in the user's browser.
    fn open_url(&self, url: &str) -> Result<(), CommandError>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemActions;

impl SystemActions {
    fn spawn(program: &str, args: &[&str]) -> Result<(), CommandError> {
        Self::spawn_reaped(program, args).map(drop)
    }

    /// Start the process and hand the `Child` to a detached thread that
    /// waits on it, so exited programs do not linger as zombies.
    fn spawn_reaped(
        program: &str,
        args: &[&str],
    ) -> Result<JoinHandle<io::Result<ExitStatus>>, CommandError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CommandError::Launch {
                program: program.to_string(),
                source,
            })?;
        let pid = child.id();
        log::info!("started `{program}` (pid {pid})");

        let name = program.to_string();
        Ok(thread::spawn(move || {
            let status = child.wait();
            match &status {
                Ok(status) => log::debug!("`{name}` (pid {pid}) exited: {status}"),
                Err(e) => log::warn!("cannot wait for `{name}` (pid {pid}): {e}"),
            }
            status
        }))
    }
}

impl ActionRunner for SystemActions {
    fn launch(&self, program: &str) -> Result<(), CommandError> {
        let mut parts = program.split_whitespace();
        let exe = parts.next().ok_or(CommandError::EmptyProgram)?;
        let args: Vec<&str> = parts.collect();
        Self::spawn(exe, &args)
    }

    fn open_url(&self, url: &str) -> Result<(), CommandError> {
        let (opener, args): (&str, Vec<&str>) = if cfg!(windows) {
            ("cmd", vec!["/C", "start", "", url])
        } else if cfg!(target_os = "macos") {
            ("open", vec![url])
        } else {
            ("xdg-open", vec![url])
        };
        Self::spawn(opener, &args).map_err(|e| CommandError::OpenUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
