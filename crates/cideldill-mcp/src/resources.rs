use cideldill_manager::Manager;
use cideldill_store::CidStore;
use serde_json::{json, Value};

use crate::error::McpError;

const BREAKPOINT_STATUS: &str = "breakpoint://status";
const BREAKPOINT_BREAKPOINTS: &str = "breakpoint://breakpoints";
const BREAKPOINT_PAUSED: &str = "breakpoint://paused";
const BREAKPOINT_CALL_HISTORY: &str = "breakpoint://call-history";
const BREAKPOINT_FUNCTIONS: &str = "breakpoint://functions";

pub fn list() -> Value {
    let resource = |uri: &str, description: &str| json!({"uri": uri, "description": description, "mimeType": "application/json"});
    json!({
        "resources": [
            resource(BREAKPOINT_STATUS, "Server-wide default behavior and com-error count"),
            resource(BREAKPOINT_BREAKPOINTS, "All registered breakpoints"),
            resource(BREAKPOINT_PAUSED, "Currently paused executions"),
            resource(BREAKPOINT_CALL_HISTORY, "All recorded calls"),
            resource(BREAKPOINT_FUNCTIONS, "Functions registered by connected debuggees"),
        ]
    })
}

pub fn read(manager: &Manager, _store: &dyn CidStore, params: &Value) -> Result<Value, McpError> {
    let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| McpError::MissingArgument("uri".into()))?;
    let contents = match uri {
        BREAKPOINT_STATUS => json!({
            "default_behavior": manager.default_behavior(),
            "com_error_count": manager.com_errors().len(),
        }),
        BREAKPOINT_BREAKPOINTS => serde_json::to_value(manager.list_breakpoints()).unwrap_or(Value::Null),
        BREAKPOINT_PAUSED => json!({"paused": manager.list_paused()}),
        BREAKPOINT_CALL_HISTORY => json!({"records": manager.call_records()}),
        BREAKPOINT_FUNCTIONS => json!({"functions": manager.list_functions()}),
        other => return Err(McpError::UnknownResource(other.to_string())),
    };
    Ok(json!({"uri": uri, "mimeType": "application/json", "text": contents.to_string()}))
}
