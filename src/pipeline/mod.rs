//! The control layer: state machine, conversation log and the
//! [`Assistant`] loop that ties the subsystems together.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────── Assistant::run (control thread) ────────────────┐
//!                 │                                                                  │
//!  cpal thread ──►│ FrameQueue ─► WakeGate ─► VoiceActivityRecorder ─► Dispatcher ─► │
//!                 │                                                 SpeechOutput-    │
//!                 │                 StateMachine (transitions,       Sequencer ──────┼─► tokio runtime
//!                 │                 observers, history)                              │   (TTS + playback)
//!                 └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod history;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use history::{ConversationLog, Exchange};
pub use runner::{Assistant, AssistantError};
pub use state::{AssistantState, StateMachine, TransitionCallback, TransitionEvent};
