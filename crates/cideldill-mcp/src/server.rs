use std::sync::Arc;

use cideldill_manager::{Manager, ManagerObserver};
use cideldill_protocol::{Action, CallRecord, PausedExecution};
use cideldill_store::CidStore;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::McpError;
use crate::jsonrpc::{RpcNotification, RpcRequest, RpcResponse, StdioTransport};
use crate::{prompts, resources, tools};

/// Forwards breakpoint lifecycle events to the stdio transport as
/// fire-and-forget JSON-RPC notifications (spec §4.H).
struct NotifyObserver {
    tx: mpsc::UnboundedSender<RpcNotification>,
}

impl ManagerObserver for NotifyObserver {
    fn on_execution_paused(&self, paused: &PausedExecution) {
        let notification = RpcNotification::new(
            "notifications/breakpoint/execution_paused",
            json!({"paused": paused}),
        );
        let _ = self.tx.send(notification);
    }

    fn on_execution_resumed(&self, pause_id: Uuid, action: &Action) {
        let notification = RpcNotification::new(
            "notifications/breakpoint/execution_resumed",
            json!({"pause_id": pause_id, "action": action}),
        );
        let _ = self.tx.send(notification);
    }

    fn on_call_completed(&self, record: &CallRecord) {
        let notification =
            RpcNotification::new("notifications/breakpoint/call_completed", json!({"record": record}));
        let _ = self.tx.send(notification);
    }
}

/// Runs the stdio JSON-RPC loop that exposes the breakpoint manager as MCP
/// tools, resources, and prompts (spec §4.H).
pub struct McpServer {
    manager: Arc<Manager>,
    store: Arc<dyn CidStore>,
    transport: StdioTransport,
    notifications: mpsc::UnboundedReceiver<RpcNotification>,
}

impl McpServer {
    pub fn new(manager: Arc<Manager>, store: Arc<dyn CidStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.add_observer(Box::new(NotifyObserver { tx }));
        McpServer { manager, store, transport: StdioTransport::new(), notifications: rx }
    }

    /// Drains notifications and dispatches incoming requests until stdin
    /// closes. Stdout is reserved exclusively for JSON-RPC while this runs.
    pub async fn run(mut self) -> Result<(), McpError> {
        loop {
            tokio::select! {
                biased;
                Some(notification) = self.notifications.recv() => {
                    self.transport.write_notification(&notification).await?;
                }
                request = self.transport.read_request() => {
                    match request? {
                        Some(request) => self.handle(request).await?,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    async fn handle(&mut self, request: RpcRequest) -> Result<(), McpError> {
        let id = request.id.clone();
        let outcome = self.dispatch(&request.method, request.params);
        let Some(id) = id else {
            // Notification from the peer: no response is sent either way.
            return Ok(());
        };
        let response = match outcome {
            Ok(result) => RpcResponse::ok(id, result),
            Err(error) => RpcResponse::err(id, &error),
        };
        self.transport.write_response(&response).await
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value, McpError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}, "resources": {}, "prompts": {}},
                "serverInfo": {"name": "cideldill-mcp", "version": env!("CARGO_PKG_VERSION")},
            })),
            "tools/list" => Ok(tools::list()),
            "tools/call" => tools::call(&self.manager, &self.store, params),
            "resources/list" => Ok(resources::list()),
            "resources/read" => resources::read(&self.manager, self.store.as_ref(), &params),
            "prompts/list" => Ok(prompts::list()),
            "prompts/get" => prompts::get(&self.manager, &params),
            other => Err(McpError::UnknownMethod(other.to_string())),
        }
    }
}
