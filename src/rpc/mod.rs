//! Line-delimited JSON RPC adapter.
//!
//! # Data Flow
//! ```text
//! accepted UnixStream
//!     → server.rs (read one line, write one line, until EOF)
//!     → codec.rs (request/response envelopes)
//!     → dispatch.rs (method name → typed handler)
//!     → hosted capability
//! ```
//!
//! # Design Decisions
//! - Methods are registered in an explicit table at construction time
//! - Method errors become error responses; the connection keeps serving
//! - Requests on one connection are answered in order

pub mod codec;
pub mod dispatch;
pub mod server;

pub use codec::{RpcRequest, RpcResponse};
pub use dispatch::{Dispatcher, MethodError};
pub use server::serve_connection;
