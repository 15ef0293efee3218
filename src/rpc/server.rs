//! Per-connection request loop.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::rpc::codec::{self, RpcRequest, RpcResponse};
use crate::rpc::dispatch::{Dispatcher, MethodError};

/// Longest request line accepted, excluding the newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Serve requests on `stream` until the peer closes it or I/O fails.
pub async fn serve_connection(
    stream: UnixStream,
    dispatcher: Arc<Dispatcher>,
    connection_id: ConnectionId,
) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut line = Vec::new();

    loop {
        let response = match read_frame(&mut reader, &mut line, MAX_LINE_BYTES).await? {
            Frame::Eof => break,
            Frame::TooLong => {
                tracing::warn!(connection_id = %connection_id, limit = MAX_LINE_BYTES, "Request line too long");
                RpcResponse::failure(Value::Null, MethodError::RequestTooLarge(MAX_LINE_BYTES).to_string())
            }
            Frame::Line if line.iter().all(u8::is_ascii_whitespace) => continue,
            Frame::Line => handle_line(&dispatcher, &line, connection_id).await,
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        write.write_all(&encoded).await?;
    }

    tracing::debug!(connection_id = %connection_id, "Peer closed connection");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// `buf` holds one line, possibly unterminated at end of stream.
    Line,
    /// The line was longer than the limit and has been skipped.
    TooLong,
    Eof,
}

/// Read one newline-terminated frame into `buf`, holding at most `limit + 1` bytes.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = (&mut *reader).take(limit as u64 + 1).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() == Some(&b'\n') || buf.len() <= limit {
        return Ok(Frame::Line);
    }

    // Skip the rest of the oversized line without buffering it.
    loop {
        buf.clear();
        let n = (&mut *reader).take(limit as u64).read_until(b'\n', buf).await?;
        if n == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(Frame::TooLong)
}

async fn handle_line(dispatcher: &Dispatcher, line: &[u8], connection_id: ConnectionId) -> RpcResponse {
    let RpcRequest { method, params, id } = match codec::decode_request(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "Malformed request");
            return RpcResponse::failure(Value::Null, MethodError::MalformedRequest(e).to_string());
        }
    };

    let start = Instant::now();
    let label = if dispatcher.contains(&method) { method.as_str() } else { "unknown" };

    match dispatcher.dispatch(&method, codec::payload(params)).await {
        Ok(result) => {
            metrics::record_request(label, "ok", start);
            RpcResponse::success(id, result)
        }
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, method = %method, error = %e, "Call failed");
            metrics::record_request(label, "error", start);
            RpcResponse::failure(id, e.to_string())
        }
    }
}
