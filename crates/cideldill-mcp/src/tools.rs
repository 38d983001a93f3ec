use std::sync::Arc;

use cideldill_codec::Cid;
use cideldill_manager::Manager;
use cideldill_protocol::{Action, Behavior, DefaultBehavior};
use cideldill_store::CidStore;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::McpError;

/// `tools/list` response: name, description, and a minimal JSON-schema for
/// each of the 14 tools the adapter exposes (spec §4.H).
pub fn list() -> Value {
    let tool = |name: &str, description: &str| json!({"name": name, "description": description, "inputSchema": {"type": "object"}});
    json!({
        "tools": [
            tool("list_breakpoints", "List all breakpoints, their behaviors, and replacements"),
            tool("add", "Register a function name as a breakpoint"),
            tool("remove", "Remove a breakpoint"),
            tool("set_behavior", "Set a breakpoint's before-call behavior (stop|go|yield)"),
            tool("set_after_behavior", "Set a breakpoint's after-call behavior (stop|go|yield)"),
            tool("set_replacement", "Set a breakpoint's replacement function"),
            tool("get_default_behavior", "Get the server-wide default behavior"),
            tool("set_default_behavior", "Set the server-wide default behavior"),
            tool("list_paused", "List currently paused executions"),
            tool("continue", "Resume a paused execution with a resume action"),
            tool("list_functions", "List functions registered by connected debuggees"),
            tool("get_call_records", "Query recorded calls, optionally filtered and limited"),
            tool("repl_eval", "Append an evaluation to a paused call's REPL transcript"),
            tool("inspect_object", "Fetch and decode a stored object by its CID"),
        ]
    })
}

pub fn call(manager: &Arc<Manager>, store: &Arc<dyn CidStore>, params: Value) -> Result<Value, McpError> {
    let name = params.get("name").and_then(Value::as_str).ok_or_else(|| McpError::MissingArgument("name".into()))?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
    match name {
        "list_breakpoints" => list_breakpoints(manager),
        "add" => add(manager, &arguments),
        "remove" => remove(manager, &arguments),
        "set_behavior" => set_behavior(manager, &arguments),
        "set_after_behavior" => set_after_behavior(manager, &arguments),
        "set_replacement" => set_replacement(manager, &arguments),
        "get_default_behavior" => Ok(json!({"default_behavior": manager.default_behavior()})),
        "set_default_behavior" => set_default_behavior(manager, &arguments),
        "list_paused" => Ok(json!({"paused": manager.list_paused()})),
        "continue" => continue_call(manager, &arguments),
        "list_functions" => Ok(json!({"functions": manager.list_functions()})),
        "get_call_records" => Ok(get_call_records(manager, &arguments)),
        "repl_eval" => repl_eval(manager, &arguments),
        "inspect_object" => inspect_object(store.as_ref(), &arguments),
        other => Err(McpError::UnknownTool(other.to_string())),
    }
}

fn required_str(arguments: &Value, field: &str) -> Result<String, McpError> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| McpError::MissingArgument(field.to_string()))
}

fn parse_behavior(arguments: &Value, field: &str) -> Result<Behavior, McpError> {
    let raw = required_str(arguments, field)?;
    serde_json::from_value(Value::String(raw.clone()))
        .map_err(|_| McpError::InvalidArgument { name: field.to_string(), detail: format!("`{raw}` is not stop, go, or yield") })
}

fn list_breakpoints(manager: &Manager) -> Result<Value, McpError> {
    Ok(serde_json::to_value(manager.list_breakpoints()).unwrap_or(Value::Null))
}

fn add(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let function_name = required_str(arguments, "function_name")?;
    manager.add_breakpoint(&function_name);
    if let Some(signature) = arguments.get("signature").and_then(Value::as_str) {
        manager.register_function(&function_name, Some(signature.to_string()));
    }
    if arguments.get("behavior").is_some() {
        manager.set_before_behavior(&function_name, parse_behavior(arguments, "behavior")?)?;
    }
    Ok(json!({"ok": true, "function_name": function_name}))
}

fn remove(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let function_name = required_str(arguments, "function_name")?;
    manager.remove_breakpoint(&function_name)?;
    Ok(json!({"ok": true}))
}

fn set_behavior(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let function_name = required_str(arguments, "function_name")?;
    let behavior = parse_behavior(arguments, "behavior")?;
    manager.set_before_behavior(&function_name, behavior)?;
    Ok(json!({"ok": true}))
}

fn set_after_behavior(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let function_name = required_str(arguments, "function_name")?;
    let behavior = parse_behavior(arguments, "behavior")?;
    manager.set_after_behavior(&function_name, behavior)?;
    Ok(json!({"ok": true}))
}

fn set_replacement(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let function_name = required_str(arguments, "function_name")?;
    let replacement_function = required_str(arguments, "replacement_function")?;
    manager.set_replacement(&function_name, &replacement_function)?;
    Ok(json!({"ok": true}))
}

fn set_default_behavior(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let raw = required_str(arguments, "default_behavior")?;
    let default: DefaultBehavior = serde_json::from_value(Value::String(raw.clone())).map_err(|_| {
        McpError::InvalidArgument { name: "default_behavior".to_string(), detail: format!("`{raw}` is not go or stop") }
    })?;
    manager.set_default_behavior(default);
    Ok(json!({"ok": true}))
}

fn continue_call(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let pause_id = required_str(arguments, "pause_id")?;
    let pause_id: Uuid = pause_id
        .parse()
        .map_err(|_| McpError::InvalidArgument { name: "pause_id".to_string(), detail: "not a UUID".to_string() })?;
    let action_body = arguments.get("action").cloned().unwrap_or_else(|| json!({}));
    let action: Action = serde_json::from_value(action_body)
        .map_err(|source| McpError::InvalidArgument { name: "action".to_string(), detail: source.to_string() })?;
    manager.resume(pause_id, action)?;
    Ok(json!({"ok": true}))
}

fn get_call_records(manager: &Manager, arguments: &Value) -> Value {
    let method_filter = arguments.get("method_name").and_then(Value::as_str);
    let limit = arguments.get("limit").and_then(Value::as_u64).map(|n| n as usize);
    let mut records = manager.call_records();
    if let Some(method_name) = method_filter {
        records.retain(|record| record.method_name == method_name);
    }
    if let Some(limit) = limit {
        if records.len() > limit {
            records = records.split_off(records.len() - limit);
        }
    }
    json!({"records": records})
}

fn repl_eval(manager: &Manager, arguments: &Value) -> Result<Value, McpError> {
    let input = required_str(arguments, "input")?;
    let session_id = match arguments.get("session_id").and_then(Value::as_str) {
        Some(raw) => raw
            .parse::<Uuid>()
            .map_err(|_| McpError::InvalidArgument { name: "session_id".to_string(), detail: "not a UUID".to_string() })?,
        None => {
            let pause_id = required_str(arguments, "pause_id")?;
            let pause_id: Uuid = pause_id
                .parse()
                .map_err(|_| McpError::InvalidArgument { name: "pause_id".to_string(), detail: "not a UUID".to_string() })?;
            manager.repl_open(pause_id, std::process::id())?.session_id
        }
    };
    let entry = manager.repl_eval(session_id, input)?;
    Ok(json!({"session_id": session_id, "entry": entry}))
}

fn inspect_object(store: &dyn CidStore, arguments: &Value) -> Result<Value, McpError> {
    let cid = required_str(arguments, "cid")?;
    let cid = Cid::parse(cid).map_err(McpError::Codec)?;
    match store.get(&cid)? {
        Some(bytes) => {
            let value = cideldill_codec::decode(&bytes)?;
            Ok(json!({"cid": cid, "value": value}))
        }
        None => Ok(json!({"cid": cid, "value": Value::Null, "found": false})),
    }
}
