//! Local voice-command assistant.
//!
//! Listens for a wake phrase, records the spoken command, transcribes it with
//! Whisper, runs the first matching command and speaks the answer.  See
//! [`pipeline::Assistant`] for the control loop.

pub mod audio;
pub mod commands;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod shutdown;
pub mod stt;
pub mod tts;
pub mod wake;

#[cfg(test)]
pub(crate) mod testing;
