use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::error::McpError;

/// One line-delimited JSON-RPC 2.0 request or notification read from stdin.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        RpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn err(id: Value, error: &McpError) -> Self {
        RpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcErrorBody { code: error.code(), message: error.to_string() }),
        }
    }
}

/// A fire-and-forget notification: no `id`, no response expected (spec §4.H
/// "adapter registers as a manager observer").
#[derive(Debug, Serialize)]
pub struct RpcNotification {
    jsonrpc: &'static str,
    method: String,
    params: Value,
}

impl RpcNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        RpcNotification { jsonrpc: "2.0", method: method.into(), params }
    }
}

/// Line-delimited JSON-RPC over the process's own stdio, mirroring the
/// teacher's `mcp::jsonrpc` transport but from the server side: one line in,
/// one line out, `\n`-terminated, flushed after every write.
pub struct StdioTransport {
    reader: BufReader<Stdin>,
    writer: Stdout,
}

impl StdioTransport {
    pub fn new() -> Self {
        StdioTransport { reader: BufReader::new(tokio::io::stdin()), writer: tokio::io::stdout() }
    }

    /// Read and parse the next request line. `Ok(None)` on clean EOF.
    pub async fn read_request(&mut self) -> Result<Option<RpcRequest>, McpError> {
        let mut line = String::new();
        let bytes = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|source| McpError::MalformedMessage(source.to_string()))?;
        if bytes == 0 {
            return Ok(None);
        }
        if line.trim().is_empty() {
            return Ok(Some(RpcRequest { id: None, method: String::new(), params: Value::Null }));
        }
        serde_json::from_str(line.trim()).map(Some).map_err(|source| McpError::MalformedMessage(source.to_string()))
    }

    pub async fn write_response(&mut self, response: &RpcResponse) -> Result<(), McpError> {
        self.write_line(response).await
    }

    pub async fn write_notification(&mut self, notification: &RpcNotification) -> Result<(), McpError> {
        self.write_line(notification).await
    }

    async fn write_line<T: Serialize>(&mut self, value: &T) -> Result<(), McpError> {
        let mut serialized =
            serde_json::to_string(value).map_err(|source| McpError::MalformedMessage(source.to_string()))?;
        serialized.push('\n');
        self.writer
            .write_all(serialized.as_bytes())
            .await
            .map_err(|source| McpError::MalformedMessage(source.to_string()))?;
        self.writer.flush().await.map_err(|source| McpError::MalformedMessage(source.to_string()))
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}
