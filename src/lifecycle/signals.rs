//! OS signal handling.
//!
//! # Responsibilities
//! - Register the termination signal set (SIGHUP, SIGINT, SIGQUIT, SIGABRT, SIGTERM)
//! - Translate the first delivery into a single shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - One watcher per server instance, dropped after the first signal
//! - SIGKILL and SIGSTOP cannot be caught and are not listed

use futures_util::future::select_all;
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use super::shutdown::{ShutdownTrigger, TriggerOrigin};

/// Watches the termination signal set for one server instance.
pub struct SignalWatcher {
    streams: Vec<(&'static str, tokio::signal::unix::Signal)>,
}

impl SignalWatcher {
    /// Register interest in the termination signal set.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> std::io::Result<Self> {
        let kinds = [
            ("SIGHUP", SignalKind::hangup()),
            ("SIGINT", SignalKind::interrupt()),
            ("SIGQUIT", SignalKind::quit()),
            ("SIGABRT", SignalKind::from_raw(Signal::SIGABRT as i32)),
            ("SIGTERM", SignalKind::terminate()),
        ];

        let streams = kinds
            .into_iter()
            .map(|(name, kind)| signal(kind).map(|stream| (name, stream)))
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self { streams })
    }

    /// Wait for the first registered signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        let pending = self.streams.iter_mut().map(|(name, stream)| {
            let name = *name;
            Box::pin(async move {
                match stream.recv().await {
                    Some(()) => name,
                    None => std::future::pending().await,
                }
            })
        });

        let (name, _, _) = select_all(pending).await;
        name
    }

    /// Fire `trigger` on the first signal, then stop observing.
    pub fn spawn(mut self, trigger: ShutdownTrigger) -> JoinHandle<()> {
        tokio::spawn(async move {
            let name = self.recv().await;
            if trigger.fire(TriggerOrigin::Signal(name)) {
                tracing::info!(signal = name, "Shutdown signal received");
            } else {
                tracing::debug!(signal = name, "Signal ignored, shutdown already in progress");
            }
        })
    }
}
