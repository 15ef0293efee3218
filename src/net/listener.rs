//! Unix domain socket listener.
//!
//! # Responsibilities
//! - Bind the plugin socket (stale-file and permission policy from config)
//! - Accept connections and hand each one to its own worker task
//! - Tell a deliberate close apart from an unexpected accept failure
//!
//! The close task sets the `closing` flag before it signals the accept loop.
//! An accept error seen while the flag is clear is a transport failure; the
//! error text is never inspected.

use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::ListenerConfig;
use crate::error::{ServerError, ServerResult};
use crate::net::connection::ConnectionTracker;
use crate::rpc::{serve_connection, Dispatcher};

/// Source of incoming connections for the accept loop.
#[async_trait]
pub(crate) trait Acceptor: Send + 'static {
    async fn accept(&mut self) -> io::Result<UnixStream>;
}

#[async_trait]
impl Acceptor for UnixListener {
    async fn accept(&mut self) -> io::Result<UnixStream> {
        UnixListener::accept(self).await.map(|(stream, _addr)| stream)
    }
}

/// Bind the socket described by `config` and start accepting.
///
/// Must be called from within a Tokio runtime.
pub fn start(config: &ListenerConfig, dispatcher: Arc<Dispatcher>) -> ServerResult<ListenerHandle> {
    let path = config.socket_path.clone();
    let bind_err = |source: io::Error| ServerError::Bind {
        path: path.clone(),
        source,
    };

    if config.remove_stale_socket {
        remove_stale_socket(&path).map_err(bind_err)?;
    }

    let listener = UnixListener::bind(&path).map_err(bind_err)?;

    if let Some(mode) = config.socket_mode {
        if let Err(e) = fs::set_permissions(&path, fs::Permissions::from_mode(mode)) {
            drop(listener);
            let _ = fs::remove_file(&path);
            return Err(bind_err(e));
        }
    }

    tracing::info!(
        socket_path = %path.display(),
        socket_mode = ?config.socket_mode.map(|m| format!("{:o}", m)),
        "Listener bound"
    );

    Ok(ListenerHandle::spawn(listener, path, dispatcher))
}

/// Remove a leftover socket file. Other file types are left in place.
///
/// A socket that still accepts connections belongs to a live server and is
/// reported as in use.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => match std::os::unix::net::UnixStream::connect(path) {
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "socket is held by a running server",
            )),
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                tracing::warn!(socket_path = %path.display(), "Removing stale socket file");
                fs::remove_file(path)
            }
            Err(e) => Err(e),
        },
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Owner of a bound socket and its accept loop.
///
/// Closed exactly once through [`close`](Self::close).
pub struct ListenerHandle {
    path: PathBuf,
    closing: Arc<AtomicBool>,
    close_tx: Option<oneshot::Sender<()>>,
    fault_rx: Option<oneshot::Receiver<ServerError>>,
    accept_loop: JoinHandle<ServerResult<()>>,
    tracker: ConnectionTracker,
    drain_timeout: Option<Duration>,
}

impl ListenerHandle {
    pub(crate) fn spawn<A: Acceptor>(acceptor: A, path: PathBuf, dispatcher: Arc<Dispatcher>) -> Self {
        let closing = Arc::new(AtomicBool::new(false));
        let (close_tx, close_rx) = oneshot::channel();
        let (fault_tx, fault_rx) = oneshot::channel();
        let tracker = ConnectionTracker::new();

        let accept_loop = tokio::spawn(accept_loop(
            acceptor,
            AcceptContext {
                path: path.clone(),
                closing: closing.clone(),
                dispatcher,
                tracker: tracker.clone(),
            },
            close_rx,
            fault_tx,
        ));

        Self {
            path,
            closing,
            close_tx: Some(close_tx),
            fault_rx: Some(fault_rx),
            accept_loop,
            tracker,
            drain_timeout: None,
        }
    }

    /// Filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-flight connection tracker.
    pub fn connections(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Wait up to `timeout` for in-flight connections after closing.
    ///
    /// `None` (the default) closes without waiting.
    pub fn set_drain_timeout(&mut self, timeout: Option<Duration>) {
        self.drain_timeout = timeout;
    }

    /// Take the receiver that reports an unexpected accept failure.
    pub fn take_fault(&mut self) -> Option<oneshot::Receiver<ServerError>> {
        self.fault_rx.take()
    }

    /// Stop accepting, remove the socket file and report how the accept loop ended.
    pub async fn close(mut self) -> ServerResult<()> {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }

        let result = match self.accept_loop.await {
            Ok(result) => result,
            Err(join_err) => Err(ServerError::Transport {
                path: self.path.clone(),
                source: Arc::new(io::Error::other(join_err)),
            }),
        };

        remove_socket_file(&self.path);
        tracing::info!(socket_path = %self.path.display(), "Listener closed");

        if let Some(timeout) = self.drain_timeout {
            let in_flight = self.tracker.active_count();
            if in_flight > 0 {
                tracing::info!(in_flight, timeout_ms = timeout.as_millis() as u64, "Draining connections");
                if !self.tracker.wait_idle_for(timeout).await {
                    tracing::warn!(
                        in_flight = self.tracker.active_count(),
                        "Drain timeout elapsed, leaving connections running"
                    );
                }
            }
        }

        result
    }
}

fn remove_socket_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(socket_path = %path.display(), "Removed socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(socket_path = %path.display(), error = %e, "Failed to remove socket file"),
    }
}

struct AcceptContext {
    path: PathBuf,
    closing: Arc<AtomicBool>,
    dispatcher: Arc<Dispatcher>,
    tracker: ConnectionTracker,
}

async fn accept_loop<A: Acceptor>(
    mut acceptor: A,
    ctx: AcceptContext,
    mut close_rx: oneshot::Receiver<()>,
    fault_tx: oneshot::Sender<ServerError>,
) -> ServerResult<()> {
    loop {
        tokio::select! {
            biased;
            // A dropped handle also ends the loop.
            _ = &mut close_rx => {
                tracing::debug!(socket_path = %ctx.path.display(), "Accept loop stopped");
                return Ok(());
            }
            accepted = acceptor.accept() => match accepted {
                Ok(stream) => {
                    let guard = ctx.tracker.track();
                    let dispatcher = ctx.dispatcher.clone();
                    tracing::debug!(connection_id = %guard.id(), "Connection accepted");

                    tokio::spawn(async move {
                        let id = guard.id();
                        if let Err(e) = serve_connection(stream, dispatcher, id).await {
                            tracing::warn!(connection_id = %id, error = %e, "Connection ended with error");
                        }
                        drop(guard);
                    });
                }
                Err(e) if ctx.closing.load(Ordering::SeqCst) => {
                    tracing::debug!(error = %e, "Accept interrupted by close");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(socket_path = %ctx.path.display(), error = %e, "Accept failed");
                    let source = Arc::new(e);
                    remove_socket_file(&ctx.path);
                    let _ = fault_tx.send(ServerError::Transport {
                        path: ctx.path.clone(),
                        source: source.clone(),
                    });
                    return Err(ServerError::Transport { path: ctx.path, source });
                }
            }
        }
    }
}
