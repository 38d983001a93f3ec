use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::serialized_item::SerializedItem;

/// Monotonic `<unix_time>-<sequence>` identifier, unique per server process.
pub type CallId = String;

static CALL_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Mint a fresh call ID formatted as `"{unix_time:.6}-{seq:03}"`. `seq`
/// never wraps (`:03` only pads a *minimum* width, matching Python's
/// `:03d`) so two calls landing in the same timestamp window still get
/// distinct ids.
pub fn next_call_id() -> CallId {
    let seq = CALL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{:.6}-{:03}", unix_timestamp(), seq)
}

pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// `(pid, process_start_time)`, collapsed into a stable grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub process_start_time: f64,
}

impl ProcessIdentity {
    /// `"{start_time:.6f}+{pid}"`; groups call records into one debuggee run.
    pub fn process_key(&self) -> String {
        format!("{:.6}+{}", self.process_start_time, self.pid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    pub filename: String,
    pub lineno: u32,
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub timestamp: f64,
    pub stack_trace: Vec<StackFrame>,
}

/// Data captured at `call/start`, before the call has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallData {
    pub method_name: String,
    pub target: SerializedItem,
    #[serde(default)]
    pub args: Vec<SerializedItem>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, SerializedItem>,
    pub call_site: CallSite,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
    pub process_identity: ProcessIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Started,
    Success,
    Exception,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub exception_type: String,
    pub exception_message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub traceback: Option<SerializedItem>,
}

/// A durable, append-then-mutate-once record of one invocation's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub method_name: String,
    pub target: SerializedItem,
    pub args: Vec<SerializedItem>,
    pub kwargs: BTreeMap<String, SerializedItem>,
    pub call_site: CallSite,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
    pub process_identity: ProcessIdentity,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<SerializedItem>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exception: Option<ExceptionInfo>,
    pub started_at: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<f64>,
}

/// Body of `POST /api/call/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub call_id: CallId,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<SerializedItem>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exception: Option<ExceptionInfo>,
    pub process_identity: ProcessIdentity,
    pub timestamp: f64,
}

/// Body of `POST /api/report-com-error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportComErrorRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub process_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub call_id: Option<CallId>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

/// A debuggee thread suspended on a poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedExecution {
    pub pause_id: Uuid,
    pub call_id: CallId,
    pub call_data: CallData,
    pub paused_at: f64,
}

/// One entry in a breakpoint's execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub call_id: CallId,
    pub method_name: String,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paused_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<f64>,
}

/// Advisory registration of a debuggee-local callable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FunctionRegistration {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<serde_json::Value>,
}

/// A ring-buffered diagnostic record of a debuggee-reported transport failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComError {
    pub reported_at: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub process_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub call_id: Option<CallId>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

/// A ring-buffered, non-call timeline entry (spec §6 `POST /api/call/event`):
/// an operator-facing annotation that doesn't correspond to an intercepted
/// invocation, e.g. a debuggee lifecycle marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub recorded_at: f64,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub process_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<serde_json::Value>,
}

/// Body of `POST /api/call/event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEventRequest {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub process_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_ids_increase_in_sequence() {
        let a = next_call_id();
        let b = next_call_id();
        assert_ne!(a, b);
    }

    #[test]
    fn process_key_format() {
        let identity = ProcessIdentity {
            pid: 42,
            process_start_time: 100.5,
        };
        assert_eq!(identity.process_key(), "100.500000+42");
    }
}
