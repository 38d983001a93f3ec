#![forbid(unsafe_code)]
//! Wire types shared by the debug client, breakpoint manager, HTTP control
//! plane, and MCP adapter. Kept dependency-light (no `tokio`, no `axum`) so
//! every other crate in the workspace can depend on it without pulling in a
//! transport.

mod action;
mod behavior;
mod call;
mod repl;
mod serialized_item;

pub use action::{
    AckStatus, Action, CidNotFoundBody, CompleteResponse, PollMarker, PollResponse, StartAction,
    StartResponse,
};
pub use behavior::{resolve_after, resolve_before, Behavior, DefaultBehavior};
pub use call::{
    next_call_id, unix_timestamp, CallData, CallId, CallRecord, CallSite, CallStatus, ComError,
    CompleteRequest, ExceptionInfo, ExecutionRecord, FunctionRegistration, PausedExecution,
    ProcessIdentity, ReportComErrorRequest, StackFrame, TimelineEvent, TimelineEventRequest,
};
pub use repl::{ReplSession, ReplTranscriptEntry};
pub use serialized_item::{SerializationFormat, SerializedItem};
