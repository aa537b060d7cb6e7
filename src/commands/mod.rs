//! Spoken-command handling.
//!
//! Recognized text goes to a [`CommandDispatcher`], which asks each
//! registered [`Command`] in order whether it matches.  The first match runs
//! and returns the sentence to speak; its side effects (starting a program,
//! opening a URL) go through an [`ActionRunner`].
//!
//! ```text
//! "öffne den taschenrechner"
//!      │
//!      ▼
//! CommandDispatcher ──find──► greeting? calculator! ──execute──► ActionRunner::launch
//!      │
//!      ▼
//! Dispatch { command: Some("calculator"), response: "Öffne den Taschenrechner" }
//! ```

pub mod actions;
pub mod builtin;
pub mod dispatcher;

use thiserror::Error;

pub use actions::{ActionRunner, SystemActions};
pub use builtin::builtin_commands;
pub use dispatcher::{CommandDispatcher, Dispatch, EXECUTION_FAILED, NOT_RECOGNIZED};

// ---------------------------------------------------------------------------
// CommandType
// ---------------------------------------------------------------------------

/// Coarse grouping used for enabling/disabling and for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Greeting,
    System,
    Web,
    Utility,
    Control,
    Help,
}

// ---------------------------------------------------------------------------
// CommandError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {url}: {reason}")]
    OpenUrl { url: String, reason: String },

    #[error("empty program name")]
    EmptyProgram,

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Command trait
// ---------------------------------------------------------------------------

/// One thing the assistant can do.
pub trait Command {
    /// Stable identifier, used in logs and the conversation log.
    fn name(&self) -> &str;

    fn kind(&self) -> CommandType;

    /// Lowercase trigger fragments.
    fn keywords(&self) -> &[&'static str];

    /// Case-insensitive substring match on any keyword.
    fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords().iter().any(|k| lower.contains(k))
    }

    /// Run the command for `text` and return the spoken response.
    fn execute(&self, text: &str, actions: &dyn ActionRunner) -> Result<String, CommandError>;
}
