#![forbid(unsafe_code)]

//! Model-Context-Protocol tool adapter over stdio for the breakpoint
//! manager (spec §4.H): exposes `Manager` operations as named tools,
//! resources, and prompts to an MCP-speaking client.

mod error;
mod jsonrpc;
mod prompts;
mod resources;
mod server;
mod tools;

pub use error::McpError;
pub use jsonrpc::{RpcNotification, RpcRequest, RpcResponse, StdioTransport};
pub use server::McpServer;
