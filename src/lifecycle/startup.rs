//! Startup orchestration.
//!
//! # Responsibilities
//! - Register signal handlers, then bind the listener
//! - Queue the listener close task ahead of caller-supplied cleanup
//! - Hand back a [`PluginServer`] to stop and await
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned before serving begins
//! - Closing the listener is the first shutdown task, so nothing new is accepted once shutdown starts

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::{ListenerConfig, PluginConfig};
use crate::error::{ServerError, ServerResult};
use crate::lifecycle::shutdown::{
    ShutdownCoordinator, ShutdownHandle, ShutdownTask, ShutdownTrigger, TerminationOutcome,
    TriggerOrigin,
};
use crate::lifecycle::signals::SignalWatcher;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{self, ListenerHandle};
use crate::rpc::Dispatcher;

/// Serve `dispatcher` on a socket at `socket_path` with default listener policy.
///
/// `cleanup` tasks run in order after the listener has been closed.
pub async fn start_plugin_at_path(
    socket_path: impl AsRef<Path>,
    dispatcher: Dispatcher,
    cleanup: Vec<ShutdownTask>,
) -> ServerResult<PluginServer> {
    let config = PluginConfig {
        listener: ListenerConfig {
            socket_path: socket_path.as_ref().to_path_buf(),
            ..ListenerConfig::default()
        },
        ..PluginConfig::default()
    };
    start_plugin(&config, dispatcher, cleanup).await
}

/// Serve `dispatcher` as described by `config`.
pub async fn start_plugin(
    config: &PluginConfig,
    dispatcher: Dispatcher,
    cleanup: Vec<ShutdownTask>,
) -> ServerResult<PluginServer> {
    tracing::info!(
        socket_path = %config.listener.socket_path.display(),
        methods = ?dispatcher.methods(),
        "Starting plugin server"
    );

    let signals = SignalWatcher::new().map_err(ServerError::Signal)?;
    let listener = listener::start(&config.listener, Arc::new(dispatcher))?;

    Ok(assemble(config, signals, listener, cleanup))
}

/// Wire a bound listener, its shutdown sequence and the signal watcher together.
fn assemble(
    config: &PluginConfig,
    signals: SignalWatcher,
    mut listener: ListenerHandle,
    cleanup: Vec<ShutdownTask>,
) -> PluginServer {
    listener.set_drain_timeout(config.shutdown.drain_timeout());
    let fault = listener.take_fault();
    let connections = listener.connections().clone();
    let socket_path = listener.path().to_path_buf();

    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(ShutdownTask::new("close listener", move || listener.close()));
    for task in cleanup {
        coordinator.register(task);
    }

    let trigger = ShutdownTrigger::new();
    let shutdown = coordinator.start(trigger.clone(), fault);
    let signal_task = SignalTask(signals.spawn(trigger.clone()));

    PluginServer {
        socket_path,
        trigger,
        connections,
        shutdown,
        _signals: signal_task,
    }
}

/// Aborts the signal watcher when the server handle goes away.
struct SignalTask(JoinHandle<()>);

impl Drop for SignalTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A running plugin server.
pub struct PluginServer {
    socket_path: PathBuf,
    trigger: ShutdownTrigger,
    connections: ConnectionTracker,
    shutdown: ShutdownHandle,
    _signals: SignalTask,
}

impl PluginServer {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Request shutdown. Returns `false` if shutdown was already requested.
    pub fn stop(&self) -> bool {
        self.trigger.fire(TriggerOrigin::External)
    }

    /// A handle that can stop the server from elsewhere.
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }

    /// Wait for the server to terminate and return its outcome.
    pub async fn wait(self) -> TerminationOutcome {
        let PluginServer { shutdown, _signals, .. } = self;
        let outcome = shutdown.wait().await;
        drop(_signals);
        outcome
    }
}

impl std::fmt::Debug for PluginServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginServer")
            .field("socket_path", &self.socket_path)
            .field("stopping", &self.trigger.is_fired())
            .finish()
    }
}
