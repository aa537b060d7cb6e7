//! Audio input: exclusive capture sessions delivering fixed-size frames.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix → resample → FrameChunker
//!           → AudioFrame (i16, chunk_samples) → FrameQueue → control thread
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use voice_assistant::audio::{AudioCaptureLoop, CpalBackend};
//! use voice_assistant::config::AudioConfig;
//!
//! let mut capture = AudioCaptureLoop::new(Box::new(CpalBackend::new(&AudioConfig::default())));
//! let queue = capture.open_queue(32).unwrap();
//! let frame = queue.recv_timeout(Duration::from_secs(1)).unwrap();
//! println!("{} samples @ {} Hz", frame.samples.len(), frame.sample_rate);
//! capture.stop_stream();
//! ```

pub mod buffer;
pub mod capture;
pub mod resample;
pub mod vad;

pub use buffer::RingBuffer;
pub use capture::{
    input_device_names, AudioBackend, AudioCaptureLoop, AudioFrame, CaptureError, CpalBackend,
    FrameConsumer, FrameQueue, StreamHandle,
};
pub use resample::{downmix, f32_to_i16, i16_to_f32, resample, FrameChunker};
pub use vad::{rms, VadDetector};
