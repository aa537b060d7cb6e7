//! Assistant states and the transition-checked state machine.
//!
//! [`AssistantState`] names the phase the control loop is in;
//! [`StateMachine`] only lets it move along a fixed set of edges:
//!
//! ```text
//! Idle                 ─► ListeningForCommand │ Shutdown │ Error
//! ListeningForCommand  ─► ProcessingCommand   │ Idle     │ Error
//! ProcessingCommand    ─► Speaking │ Cooldown │ Idle     │ Error
//! Speaking             ─► Cooldown            │ Idle     │ Error
//! Cooldown             ─► Idle                           │ Error
//! Error                ─► Idle                │ Shutdown
//! Shutdown             ─► (none)
//! ```
//!
//! Shutdown is only reachable from `Idle` and `Error`, so a shutdown request
//! in any other state first walks back to `Idle`.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Local};

// ---------------------------------------------------------------------------
// AssistantState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantState {
    /// Listening for the wake phrase.
    Idle,
    /// Wake phrase heard; recording the command.
    ListeningForCommand,
    /// Dispatching the recognized text.
    ProcessingCommand,
    /// Playing the response.
    Speaking,
    /// Waiting before the wake phrase is accepted again.
    Cooldown,
    /// Recovering from an unexpected handler failure.
    Error,
    /// Terminal.
    Shutdown,
}

impl AssistantState {
    pub const ALL: [AssistantState; 7] = [
        AssistantState::Idle,
        AssistantState::ListeningForCommand,
        AssistantState::ProcessingCommand,
        AssistantState::Speaking,
        AssistantState::Cooldown,
        AssistantState::Error,
        AssistantState::Shutdown,
    ];

    /// States reachable in one step.
    pub fn successors(self) -> &'static [AssistantState] {
        use AssistantState::*;
        match self {
            Idle => &[ListeningForCommand, Shutdown, Error],
            ListeningForCommand => &[ProcessingCommand, Idle, Error],
            ProcessingCommand => &[Speaking, Idle, Cooldown, Error],
            Speaking => &[Cooldown, Idle, Error],
            Cooldown => &[Idle, Error],
            Error => &[Idle, Shutdown],
            Shutdown => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    pub fn label(self) -> &'static str {
        match self {
            AssistantState::Idle => "idle",
            AssistantState::ListeningForCommand => "listening_for_command",
            AssistantState::ProcessingCommand => "processing_command",
            AssistantState::Speaking => "speaking",
            AssistantState::Cooldown => "cooldown",
            AssistantState::Error => "error",
            AssistantState::Shutdown => "shutdown",
        }
    }
}

impl Default for AssistantState {
    fn default() -> Self {
        AssistantState::Idle
    }
}

impl std::fmt::Display for AssistantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// TransitionEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub from: AssistantState,
    pub to: AssistantState,
    pub timestamp: DateTime<Local>,
}

/// Observer run after entering a state.  Errors and panics are logged and
/// swallowed.
pub type TransitionCallback = Box<dyn FnMut(&TransitionEvent) -> anyhow::Result<()>>;

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

pub struct StateMachine {
    current: AssistantState,
    previous: Option<AssistantState>,
    callbacks: HashMap<AssistantState, Vec<TransitionCallback>>,
    history: VecDeque<TransitionEvent>,
    history_capacity: usize,
}

impl StateMachine {
    /// Starts in [`AssistantState::Idle`] and keeps at most
    /// `history_capacity` transitions.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            current: AssistantState::Idle,
            previous: None,
            callbacks: HashMap::new(),
            history: VecDeque::with_capacity(history_capacity.min(1024)),
            history_capacity,
        }
    }

    pub fn current(&self) -> AssistantState {
        self.current
    }

    pub fn previous(&self) -> Option<AssistantState> {
        self.previous
    }

    pub fn can_transition(&self, target: AssistantState) -> bool {
        self.current.successors().contains(&target)
    }

    /// Move to `target` if the edge exists.
    ///
    /// Returns `false` and leaves the state untouched for a forbidden edge.
    pub fn transition(&mut self, target: AssistantState) -> bool {
        if !self.can_transition(target) {
            log::warn!("invalid transition {} → {target}", self.current);
            return false;
        }

        let event = TransitionEvent {
            from: self.current,
            to: target,
            timestamp: Local::now(),
        };
        self.previous = Some(self.current);
        self.current = target;
        log::info!("state {} → {}", event.from, event.to);

        if let Some(callbacks) = self.callbacks.get_mut(&target) {
            for callback in callbacks.iter_mut() {
                match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::error!("state callback for {target} failed: {e:#}"),
                    Err(_) => log::error!("state callback for {target} panicked"),
                }
            }
        }

        if self.history_capacity > 0 {
            if self.history.len() == self.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(event);
        }
        true
    }

    /// Run `callback` every time `state` is entered, after earlier callbacks
    /// for the same state.
    pub fn on_state_change(
        &mut self,
        state: AssistantState,
        callback: impl FnMut(&TransitionEvent) -> anyhow::Result<()> + 'static,
    ) {
        self.callbacks
            .entry(state)
            .or_default()
            .push(Box::new(callback));
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.history.iter()
    }

    /// Back to `Idle` with no previous state and an empty history.
    /// Callbacks stay registered and are not run.
    pub fn reset(&mut self) {
        self.current = AssistantState::Idle;
        self.previous = None;
        self.history.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
