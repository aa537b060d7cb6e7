//! Shutdown requests shared between the signal task and the control loop.
//!
//! The control thread never blocks on the signal itself; it polls
//! [`ShutdownSignal::is_requested`] once per tick and from inside every
//! blocking wait (recording, draining, cooldown).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable one-way flag.  Once requested it stays requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            log::info!("shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Spawn a task on `runtime` that requests shutdown on Ctrl-C (and
    /// SIGTERM on Unix).
    pub fn listen_for_os_signals(&self, runtime: &tokio::runtime::Handle) {
        let signal = self.clone();
        runtime.spawn(async move {
            wait_for_os_signal().await;
            signal.request();
        });
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("cannot register SIGTERM handler: {e}");
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => log::debug!("received SIGTERM"),
        _ = tokio::signal::ctrl_c() => log::debug!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
