//! Ordered command registry with failure isolation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::{builtin_commands, ActionRunner, Command, CommandType};
use crate::config::CommandsConfig;

/// Spoken when no command matches.
pub const NOT_RECOGNIZED: &str = "Befehl nicht erkannt";
/// Spoken when the matching command fails or panics.
pub const EXECUTION_FAILED: &str = "Fehler bei der Ausführung";

/// Outcome of dispatching one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Name of the command that ran, if any matched.
    pub command: Option<String>,
    pub response: String,
    pub failed: bool,
}

pub struct CommandDispatcher {
    commands: Vec<Box<dyn Command>>,
    actions: Box<dyn ActionRunner>,
}

impl CommandDispatcher {
    /// An empty registry.
    pub fn new(actions: Box<dyn ActionRunner>) -> Self {
        Self {
            commands: Vec::new(),
            actions,
        }
    }

    /// Registry pre-filled with the enabled built-ins.
    pub fn with_builtins(config: &CommandsConfig, actions: Box<dyn ActionRunner>) -> Self {
        let mut dispatcher = Self::new(actions);
        for command in builtin_commands(config) {
            dispatcher.register(command);
        }
        log::info!("loaded {} commands", dispatcher.len());
        dispatcher
    }

    /// Append `command`; it is consulted after everything registered before.
    pub fn register(&mut self, command: Box<dyn Command>) {
        log::debug!("registered command {}", command.name());
        self.commands.push(command);
    }

    /// First registered command matching `text`.
    pub fn find(&self, text: &str) -> Option<&dyn Command> {
        self.commands
            .iter()
            .map(|c| c.as_ref())
            .find(|c| c.matches(text))
    }

    /// Find and run the matching command.  Never fails: errors and panics
    /// become [`EXECUTION_FAILED`], no match becomes [`NOT_RECOGNIZED`].
    pub fn respond(&self, text: &str) -> Dispatch {
        let Some(command) = self.find(text) else {
            log::info!("no command matched {text:?}");
            return Dispatch {
                command: None,
                response: NOT_RECOGNIZED.to_string(),
                failed: false,
            };
        };

        let name = command.name().to_string();
        log::info!("executing command {name}");

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            command.execute(text, self.actions.as_ref())
        }));

        let (response, failed) = match outcome {
            Ok(Ok(response)) => (response, false),
            Ok(Err(e)) => {
                log::error!("command {name} failed: {e}");
                (EXECUTION_FAILED.to_string(), true)
            }
            Err(_) => {
                log::error!("command {name} panicked");
                (EXECUTION_FAILED.to_string(), true)
            }
        };

        Dispatch {
            command: Some(name),
            response,
            failed,
        }
    }

    pub fn commands_of_type(&self, kind: CommandType) -> Vec<&dyn Command> {
        self.commands
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| c.kind() == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandError;
    use crate::testing::RecordingActions;

    struct Fixed {
        name: &'static str,
        keywords: &'static [&'static str],
        behaviour: Behaviour,
    }

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Panic,
    }

    impl Command for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> CommandType {
            CommandType::Utility
        }

        fn keywords(&self) -> &[&'static str] {
            self.keywords
        }

        fn execute(&self, _text: &str, _actions: &dyn ActionRunner) -> Result<String, CommandError> {
            match self.behaviour {
                Behaviour::Reply(r) => Ok(r.to_string()),
                Behaviour::Fail => Err(CommandError::Other("kaputt".into())),
                Behaviour::Panic => panic!("command blew up"),
            }
        }
    }

    fn dispatcher(commands: Vec<Fixed>) -> CommandDispatcher {
        let mut d = CommandDispatcher::new(Box::new(RecordingActions::default()));
        for c in commands {
            d.register(Box::new(c));
        }
        d
    }

    #[test]
    fn first_registered_match_wins() {
        let d = dispatcher(vec![
            Fixed {
                name: "first",
                keywords: &["licht"],
                behaviour: Behaviour::Reply("eins"),
            },
            Fixed {
                name: "second",
                keywords: &["licht", "an"],
                behaviour: Behaviour::Reply("zwei"),
            },
        ]);

        assert_eq!(d.find("Licht an").map(|c| c.name()), Some("first"));
        assert_eq!(d.respond("licht an").response, "eins");
    }

    #[test]
    fn no_match_is_not_recognized() {
        let d = dispatcher(vec![]);
        let dispatch = d.respond("irgendwas");
        assert_eq!(dispatch.command, None);
        assert_eq!(dispatch.response, NOT_RECOGNIZED);
        assert!(!dispatch.failed);
    }

    #[test]
    fn errors_and_panics_become_generic_failure() {
        let d = dispatcher(vec![
            Fixed {
                name: "broken",
                keywords: &["kaputt"],
                behaviour: Behaviour::Fail,
            },
            Fixed {
                name: "explosive",
                keywords: &["bumm"],
                behaviour: Behaviour::Panic,
            },
        ]);

        let failed = d.respond("mach kaputt");
        assert_eq!(failed.command.as_deref(), Some("broken"));
        assert_eq!(failed.response, EXECUTION_FAILED);
        assert!(failed.failed);

        let panicked = d.respond("bumm");
        assert_eq!(panicked.response, EXECUTION_FAILED);
        assert!(panicked.failed);
    }

    #[test]
    fn builtins_with_failing_launcher() {
        let d = CommandDispatcher::with_builtins(
            &CommandsConfig::default(),
            Box::new(RecordingActions::failing()),
        );
        let dispatch = d.respond("öffne den taschenrechner");
        assert_eq!(dispatch.command.as_deref(), Some("calculator"));
        assert_eq!(dispatch.response, EXECUTION_FAILED);
    }

    #[test]
    fn runtime_commands_come_after_builtins() {
        let mut d = CommandDispatcher::with_builtins(
            &CommandsConfig::default(),
            Box::new(RecordingActions::default()),
        );
        d.register(Box::new(Fixed {
            name: "lights",
            keywords: &["licht", "hallo"],
            behaviour: Behaviour::Reply("Licht an"),
        }));

        assert_eq!(d.len(), 11);
        assert_eq!(d.respond("licht").response, "Licht an");
        assert_eq!(d.find("hallo licht").map(|c| c.name()), Some("greeting"));
        assert_eq!(d.commands_of_type(CommandType::System).len(), 3);
        assert_eq!(d.commands_of_type(CommandType::Utility).len(), 3);
    }
}
