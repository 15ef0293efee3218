//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Unix socket connection
//!     → listener.rs (accept loop, close classification)
//!     → connection.rs (connection ID, in-flight tracking)
//!     → Hand off to the RPC layer, one task per connection
//! ```
//!
//! # Design Decisions
//! - Workers never block the accept loop
//! - Only the listener close task closes the socket

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{start, ListenerHandle};
