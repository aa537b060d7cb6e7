//! Exclusive microphone capture.
//!
//! [`AudioCaptureLoop`] owns at most one live input stream at a time.  The
//! stream is produced by an [`AudioBackend`] (cpal in production, a scripted
//! backend in tests) and delivers fixed-size [`AudioFrame`]s to a consumer
//! that runs on the platform audio thread.
//!
//! ```text
//!  audio thread                         control thread
//!  ────────────                         ──────────────
//!  device callback
//!    └─► downmix/resample/chunk
//!          └─► consumer(frame) ──try_send──► FrameQueue ──try_recv──► wake / recognizer
//! ```
//!
//! Frames cross threads only through the bounded [`FrameQueue`]; the audio
//! thread is the only writer and the control thread the only reader.  When
//! the queue is full the frame is dropped and counted instead of blocking the
//! audio thread.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::resample::{downmix, resample, FrameChunker};
use crate::config::AudioConfig;
use crate::shutdown::ShutdownSignal;

/// Longest a blocking wait goes without checking for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One fixed-length block of mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Wall-clock length of the frame.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Callback invoked on the audio thread for every frame.
pub type FrameConsumer = Box<dyn FnMut(AudioFrame) + Send + 'static>;

/// Receiving end of a capture session opened with
/// [`AudioCaptureLoop::open_queue`].
pub type FrameQueue = Receiver<AudioFrame>;

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard for a live input stream.  Dropping it closes the stream.
///
/// Backends put whatever keeps their stream alive in here (`cpal::Stream`,
/// a worker thread guard, ...).
pub struct StreamHandle {
    _guard: Box<dyn Any>,
}

impl StreamHandle {
    pub fn new<G: 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamHandle")
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Device-level failures.  None of these are fatal to the control loop.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no matching audio input device")]
    NoDevice,

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("an input stream is already open")]
    AlreadyStreaming,

    #[error("no audio frame arrived within {0:?}")]
    Timeout(Duration),

    #[error("audio stream closed unexpectedly")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// AudioBackend
// ---------------------------------------------------------------------------

/// Source of input streams.
pub trait AudioBackend {
    /// Open a stream that calls `consumer` for every frame until the returned
    /// handle is dropped.  No frame may be delivered after the drop returns.
    fn open(&self, consumer: FrameConsumer) -> Result<StreamHandle, CaptureError>;
}

// ---------------------------------------------------------------------------
// AudioCaptureLoop
// ---------------------------------------------------------------------------

/// Holds the single live stream, if any.
pub struct AudioCaptureLoop {
    backend: Box<dyn AudioBackend>,
    active: Option<StreamHandle>,
    /// Incremented by the audio thread only.
    dropped: Arc<AtomicU64>,
}

impl AudioCaptureLoop {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            active: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open the stream and deliver every frame to `consumer`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AlreadyStreaming`] if a stream is already live (it is
    /// left untouched), or the backend's device error.  On error no stream is
    /// open.
    pub fn start_stream(&mut self, consumer: FrameConsumer) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyStreaming);
        }
        let handle = self.backend.open(consumer)?;
        log::debug!("audio input stream opened");
        self.active = Some(handle);
        Ok(())
    }

    /// Close the live stream.  A no-op when nothing is open.
    pub fn stop_stream(&mut self) {
        if self.active.take().is_some() {
            log::debug!("audio input stream closed");
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Start a stream whose frames land in a bounded queue of `capacity`
    /// frames.  Frames arriving while the queue is full are dropped and
    /// counted in [`AudioCaptureLoop::dropped_frames`].
    pub fn open_queue(&mut self, capacity: usize) -> Result<FrameQueue, CaptureError> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let dropped = Arc::clone(&self.dropped);
        self.start_stream(Box::new(move |frame| {
            if let Err(TrySendError::Full(_)) = tx.try_send(frame) {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        }))?;
        Ok(rx)
    }

    /// Open a short-lived stream, read and discard exactly `frames` frames,
    /// then close it.
    ///
    /// Waits at most `per_frame_timeout` for each frame and gives up early,
    /// without error, once `shutdown` is requested.  The stream is closed on
    /// every path.
    pub fn drain(
        &mut self,
        frames: usize,
        per_frame_timeout: Duration,
        shutdown: &ShutdownSignal,
    ) -> Result<(), CaptureError> {
        if frames == 0 {
            return Ok(());
        }
        let queue = self.open_queue(frames)?;
        let outcome = Self::discard(&queue, frames, per_frame_timeout, shutdown);
        self.stop_stream();
        match outcome {
            Ok(n) if n == frames => log::debug!("discarded {n} stale frames"),
            Ok(n) => log::debug!("purge interrupted by shutdown after {n} frames"),
            Err(_) => {}
        }
        outcome.map(drop)
    }

    fn discard(
        queue: &FrameQueue,
        frames: usize,
        per_frame_timeout: Duration,
        shutdown: &ShutdownSignal,
    ) -> Result<usize, CaptureError> {
        for discarded in 0..frames {
            let deadline = Instant::now() + per_frame_timeout;
            loop {
                if shutdown.is_requested() {
                    return Ok(discarded);
                }
                let wait = deadline.saturating_duration_since(Instant::now());
                if wait.is_zero() {
                    return Err(CaptureError::Timeout(per_frame_timeout));
                }
                match queue.recv_timeout(wait.min(SHUTDOWN_POLL)) {
                    Ok(_) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::Disconnected),
                }
            }
        }
        Ok(frames)
    }

    /// Frames lost to a full queue since construction.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for AudioCaptureLoop {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// Microphone input through `cpal`.
///
/// Opens the device's default `f32` configuration and converts each callback
/// buffer to mono `i16` frames of `chunk_samples` at `sample_rate`.
#[derive(Debug, Clone)]
pub struct CpalBackend {
    device_index: Option<usize>,
    sample_rate: u32,
    chunk_samples: usize,
}

impl CpalBackend {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device_index: config.device_index,
            sample_rate: config.sample_rate,
            chunk_samples: config.chunk_samples,
        }
    }

    fn device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match self.device_index {
            Some(index) => host
                .input_devices()?
                .nth(index)
                .ok_or(CaptureError::NoDevice),
            None => host.default_input_device().ok_or(CaptureError::NoDevice),
        }
    }
}

impl AudioBackend for CpalBackend {
    fn open(&self, mut consumer: FrameConsumer) -> Result<StreamHandle, CaptureError> {
        let device = self.device()?;
        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let native_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "capturing from {:?} ({native_rate} Hz, {channels} ch) → {} Hz frames of {}",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            self.sample_rate,
            self.chunk_samples,
        );

        let target_rate = self.sample_rate;
        let mut chunker = FrameChunker::new(self.chunk_samples);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = resample(&downmix(data, channels), native_rate, target_rate);
                chunker.push(&mono, |samples| {
                    consumer(AudioFrame {
                        samples,
                        sample_rate: target_rate,
                    })
                });
            },
            |err: cpal::StreamError| {
                log::error!("audio input stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle::new(stream))
    }
}

/// Names of the host's input devices in index order, for `audio.device_index`.
pub fn input_device_names() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    Ok(host
        .input_devices()?
        .map(|d| d.name().unwrap_or_else(|_| "<unnamed>".into()))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn frames_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioFrame>();
    }

    #[test]
    fn frame_duration() {
        let frame = AudioFrame {
            samples: vec![0; 1280],
            sample_rate: 16_000,
        };
        assert_eq!(frame.duration(), Duration::from_millis(80));
    }

    #[test]
    fn stop_without_stream_is_noop() {
        let backend = ScriptedBackend::new(1280);
        let probe = backend.probe();
        let mut capture = AudioCaptureLoop::new(Box::new(backend));

        capture.stop_stream();
        capture.stop_stream();

        assert!(!capture.is_streaming());
        assert_eq!(probe.opened(), 0);
    }

    #[test]
    fn second_start_is_rejected_while_live() {
        let backend = ScriptedBackend::new(160);
        let probe = backend.probe();
        let mut capture = AudioCaptureLoop::new(Box::new(backend));

        let _queue = capture.open_queue(4).expect("first stream");
        let second = capture.start_stream(Box::new(|_| {}));
        assert!(matches!(second, Err(CaptureError::AlreadyStreaming)));
        assert_eq!(probe.max_live(), 1);

        capture.stop_stream();
        assert_eq!(probe.live(), 0);
    }

    #[test]
    fn queue_delivers_fixed_size_frames() {
        let mut capture = AudioCaptureLoop::new(Box::new(ScriptedBackend::new(1280)));
        let queue = capture.open_queue(8).expect("stream");

        let frame = queue.recv_timeout(WAIT).expect("frame");
        assert_eq!(frame.samples.len(), 1280);
        assert_eq!(frame.sample_rate, 16_000);

        capture.stop_stream();
    }

    #[test]
    fn drain_reads_n_frames_then_closes() {
        let backend = ScriptedBackend::new(160);
        let probe = backend.probe();
        let mut capture = AudioCaptureLoop::new(Box::new(backend));

        capture.drain(5, WAIT, &ShutdownSignal::new()).expect("drain");

        assert!(!capture.is_streaming());
        assert_eq!(probe.live(), 0);
        assert_eq!(probe.opened(), 1);
        assert!(probe.delivered() >= 5);
    }

    #[test]
    fn stalled_device_times_out_and_closes() {
        let backend = ScriptedBackend::new(160).stalled();
        let probe = backend.probe();
        let mut capture = AudioCaptureLoop::new(Box::new(backend));

        let err = capture
            .drain(3, Duration::from_millis(100), &ShutdownSignal::new())
            .unwrap_err();

        assert!(matches!(err, CaptureError::Timeout(_)));
        assert_eq!(probe.live(), 0);
    }

    #[test]
    fn shutdown_interrupts_drain_on_stalled_device() {
        let backend = ScriptedBackend::new(160).stalled();
        let probe = backend.probe();
        let mut capture = AudioCaptureLoop::new(Box::new(backend));
        let shutdown = ShutdownSignal::new();

        let trigger = shutdown.clone();
        let requester = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trigger.request();
        });

        let started = std::time::Instant::now();
        capture
            .drain(15, Duration::from_secs(2), &shutdown)
            .expect("shutdown is not an error");
        requester.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!capture.is_streaming());
        assert_eq!(probe.live(), 0);
    }

    #[test]
    fn device_failure_leaves_no_stream() {
        let backend = ScriptedBackend::new(160).failing();
        let probe = backend.probe();
        let mut capture = AudioCaptureLoop::new(Box::new(backend));

        assert!(capture.open_queue(4).is_err());
        assert!(capture.drain(3, WAIT, &ShutdownSignal::new()).is_err());
        assert!(!capture.is_streaming());
        assert_eq!(probe.live(), 0);
    }

    #[test]
    fn full_queue_counts_dropped_frames() {
        let mut capture = AudioCaptureLoop::new(Box::new(ScriptedBackend::new(160)));
        let _queue = capture.open_queue(1).expect("stream");

        let deadline = std::time::Instant::now() + WAIT;
        while capture.dropped_frames() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        capture.stop_stream();
        assert!(capture.dropped_frames() > 0);
    }
}
