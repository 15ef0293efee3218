use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

/// Request envelope as written on the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Value,
    pub id: Value,
}

/// Response envelope as read from the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// The plugin answered with an error string.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("connection closed by plugin")]
    Closed,

    #[error("response id {got} does not match request id {expected}")]
    IdMismatch { expected: u64, got: Value },
}

/// A connection to a single plugin socket.
///
/// Calls are sequential: each call writes one request and waits for its response.
pub struct PluginClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: AtomicU64,
}

impl PluginClient {
    /// Connect to the plugin listening at `socket_path`.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
            next_id: AtomicU64::new(0),
        })
    }

    /// Invoke `method` with typed params and decode the typed result.
    pub async fn call<P, R>(&mut self, method: &str, params: &P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            method: method.to_string(),
            params: serde_json::to_value(params)?,
            id: Value::from(id),
        };

        let response = self.round_trip(&request).await?;
        if response.id != Value::from(id) {
            return Err(ClientError::IdMismatch { expected: id, got: response.id });
        }
        if let Some(error) = response.error {
            return Err(ClientError::Remote(error));
        }

        Ok(serde_json::from_value(response.result.unwrap_or(Value::Null))?)
    }

    /// Write a raw line and read back the raw response envelope.
    ///
    /// Useful for sending hand-built or deliberately malformed requests.
    pub async fn send_raw(&mut self, line: &str) -> Result<RpcResponse, ClientError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        self.read_response().await
    }

    async fn round_trip(&mut self, request: &RpcRequest) -> Result<RpcResponse, ClientError> {
        let line = serde_json::to_string(request)?;
        self.send_raw(&line).await
    }

    async fn read_response(&mut self) -> Result<RpcResponse, ClientError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Closed);
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
