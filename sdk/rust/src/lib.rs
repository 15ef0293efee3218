//! Client SDK for plugins served by `plugin-host`.
//!
//! Speaks the line-delimited JSON protocol over a Unix domain socket:
//! one request object per line, one response object per line.

mod client;

pub use client::{ClientError, PluginClient, RpcRequest, RpcResponse};
