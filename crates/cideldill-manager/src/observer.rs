use cideldill_protocol::{Action, CallRecord, PausedExecution};

/// Fan-out hook for breakpoint lifecycle events. The MCP adapter (§4.H)
/// registers one of these to translate manager events into JSON-RPC
/// notifications.
pub trait ManagerObserver: Send + Sync {
    fn on_execution_paused(&self, _paused: &PausedExecution) {}
    fn on_execution_resumed(&self, _pause_id: uuid::Uuid, _action: &Action) {}
    fn on_call_completed(&self, _record: &CallRecord) {}
}
