//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Register signals → Bind listener → Queue shutdown tasks → Serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger fired once → Close listener → Caller cleanup tasks → Outcome
//!
//! Signals (signals.rs):
//!     SIGHUP/SIGINT/SIGQUIT/SIGABRT/SIGTERM → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - One trigger per server; the first source wins, the rest are no-ops
//! - Ordered shutdown: stop accepting, then caller cleanup
//! - A failing task ends the sequence and becomes the outcome
//! - Drain-less unless a drain timeout is configured

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{
    ShutdownCoordinator, ShutdownHandle, ShutdownTask, ShutdownTrigger, TerminationOutcome,
    TriggerOrigin,
};
pub use signals::SignalWatcher;
pub use startup::{start_plugin, start_plugin_at_path, PluginServer};
