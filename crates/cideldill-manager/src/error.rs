use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("breakpoint `{name}` is not registered")]
    BreakpointNotFound { name: String },
    #[error("replacement `{replacement}` for `{name}` has a different signature (or is unregistered)")]
    SignatureMismatch { name: String, replacement: String },
    #[error("no paused execution with pause_id `{pause_id}`")]
    PauseNotFound { pause_id: uuid::Uuid },
    #[error("pause `{pause_id}` already has a recorded resume action")]
    PauseAlreadyResumed { pause_id: uuid::Uuid },
    #[error("`{value}` is not a valid behavior (expected stop, go, or yield)")]
    InvalidBehavior { value: String },
    #[error("no pending call with call_id `{call_id}`")]
    CallNotFound { call_id: String },
    #[error("post-completion pauses only support the `continue` resume action")]
    UnsupportedPostCompletionAction,
    #[error("no repl session `{session_id}`")]
    ReplSessionNotFound { session_id: uuid::Uuid },
}
