use cideldill_manager::Manager;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::McpError;

pub fn list() -> Value {
    json!({
        "prompts": [
            {
                "name": "debug-session-start",
                "description": "Summarize current breakpoints and default behavior for an operator starting a session",
            },
            {
                "name": "inspect-paused-call",
                "description": "Summarize a paused execution's call data and the breakpoint's recent history",
                "arguments": [{"name": "pause_id", "required": true}],
            },
        ]
    })
}

pub fn get(manager: &Manager, params: &Value) -> Result<Value, McpError> {
    let name = params.get("name").and_then(Value::as_str).ok_or_else(|| McpError::MissingArgument("name".into()))?;
    match name {
        "debug-session-start" => Ok(debug_session_start(manager)),
        "inspect-paused-call" => inspect_paused_call(manager, params),
        other => Err(McpError::UnknownPrompt(other.to_string())),
    }
}

fn debug_session_start(manager: &Manager) -> Value {
    let breakpoints = manager.list_breakpoints();
    let text = format!(
        "Default behavior is {:?}. {} breakpoint(s) registered.",
        manager.default_behavior(),
        breakpoints.breakpoints.len(),
    );
    json!({
        "description": "Current session state",
        "messages": [{"role": "user", "content": {"type": "text", "text": text}}],
        "breakpoints": breakpoints,
    })
}

fn inspect_paused_call(manager: &Manager, params: &Value) -> Result<Value, McpError> {
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
    let pause_id = arguments
        .get("pause_id")
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::MissingArgument("pause_id".into()))?;
    let pause_id: Uuid = pause_id
        .parse()
        .map_err(|_| McpError::InvalidArgument { name: "pause_id".to_string(), detail: "not a UUID".to_string() })?;
    let paused = manager
        .list_paused()
        .into_iter()
        .find(|execution| execution.pause_id == pause_id)
        .ok_or_else(|| McpError::InvalidArgument { name: "pause_id".to_string(), detail: "no such paused execution".to_string() })?;
    let history = manager.history(&paused.call_data.method_name, Some(10));
    let text = format!(
        "Call {} to `{}` paused at {}. {} recent history entr{}.",
        paused.call_id,
        paused.call_data.method_name,
        paused.paused_at,
        history.len(),
        if history.len() == 1 { "y" } else { "ies" },
    );
    Ok(json!({
        "description": "Paused call detail",
        "messages": [{"role": "user", "content": {"type": "text", "text": text}}],
        "paused": paused,
        "history": history,
    }))
}
