//! Unix socket plugin host.
//!
//! Serves a pluggable capability over line-delimited JSON on a Unix domain
//! socket and shuts down once, on signal or on request, running its cleanup
//! tasks in order.

pub mod config;
pub mod error;
pub mod group;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::PluginConfig;
pub use error::{ServerError, ServerResult};
pub use lifecycle::{start_plugin, start_plugin_at_path, PluginServer, ShutdownTask, TerminationOutcome};
pub use rpc::Dispatcher;
