//! Error types for the plugin server lifecycle.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by shutdown tasks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The socket could not be created or listened on.
    #[error("failed to bind plugin socket at {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed without a deliberate close.
    #[error("listener at {} failed unexpectedly: {source}", .path.display())]
    Transport {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A registered shutdown task returned an error.
    #[error("shutdown task `{name}` failed: {source}")]
    ShutdownTask {
        name: String,
        #[source]
        source: BoxError,
    },

    /// OS signal handlers could not be installed.
    #[error("failed to register signal handlers: {0}")]
    Signal(#[source] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
