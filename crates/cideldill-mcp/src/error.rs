use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("malformed JSON-RPC message: {0}")]
    MalformedMessage(String),
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("unknown resource uri `{0}`")]
    UnknownResource(String),
    #[error("unknown prompt `{0}`")]
    UnknownPrompt(String),
    #[error("missing required argument `{0}`")]
    MissingArgument(String),
    #[error("invalid argument `{name}`: {detail}")]
    InvalidArgument { name: String, detail: String },
    #[error(transparent)]
    Manager(#[from] cideldill_manager::ManagerError),
    #[error(transparent)]
    Store(#[from] cideldill_store::StoreError),
    #[error(transparent)]
    Codec(#[from] cideldill_codec::CodecError),
    #[error("stdio transport closed")]
    TransportClosed,
}

impl McpError {
    /// JSON-RPC error code, following the standard reserved ranges plus the
    /// `mcp` SDK's own `-32000..-32099` "server error" band the source
    /// implementation's tool handlers raise into.
    pub fn code(&self) -> i64 {
        match self {
            McpError::MalformedMessage(_) => -32700,
            McpError::UnknownMethod(_)
            | McpError::UnknownTool(_)
            | McpError::UnknownResource(_)
            | McpError::UnknownPrompt(_) => -32601,
            McpError::MissingArgument(_) | McpError::InvalidArgument { .. } => -32602,
            McpError::Manager(_) | McpError::Store(_) | McpError::Codec(_) => -32000,
            McpError::TransportClosed => -32000,
        }
    }
}
