use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cideldill_codec::Cid;
use serde_json::json;
use thiserror::Error;

/// HTTP-layer errors, mapped onto the discriminants in the documented error
/// body shape (`{error: "<discriminant>", ...}`).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Manager(#[from] cideldill_manager::ManagerError),
    #[error(transparent)]
    Store(#[from] cideldill_store::StoreError),
    #[error("one or more referenced objects are not in the store")]
    CidNotFound { missing_cids: Vec<Cid> },
    #[error("`{value}` is not a valid behavior (expected stop, go, or yield)")]
    InvalidBehavior { value: String },
    #[error("no pending call with call_id `{call_id}`")]
    CallNotFound { call_id: String },
    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, discriminant) = match &self {
            ServerError::Manager(cideldill_manager::ManagerError::BreakpointNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "breakpoint_not_found")
            }
            ServerError::Manager(cideldill_manager::ManagerError::SignatureMismatch { .. }) => {
                (StatusCode::BAD_REQUEST, "signature_mismatch")
            }
            ServerError::Manager(cideldill_manager::ManagerError::PauseNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "pause_not_found")
            }
            ServerError::Manager(cideldill_manager::ManagerError::PauseAlreadyResumed { .. }) => {
                (StatusCode::BAD_REQUEST, "pause_already_resumed")
            }
            ServerError::Manager(cideldill_manager::ManagerError::InvalidBehavior { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_behavior")
            }
            ServerError::Manager(cideldill_manager::ManagerError::CallNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "call_not_found")
            }
            ServerError::Manager(cideldill_manager::ManagerError::UnsupportedPostCompletionAction) => {
                (StatusCode::BAD_REQUEST, "unsupported_post_completion_action")
            }
            ServerError::Manager(cideldill_manager::ManagerError::ReplSessionNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "repl_session_not_found")
            }
            ServerError::Store(cideldill_store::StoreError::CidMismatch { .. }) => {
                (StatusCode::BAD_REQUEST, "cid_mismatch")
            }
            ServerError::Store(cideldill_store::StoreError::Backend { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store_backend_error")
            }
            ServerError::CidNotFound { .. } => (StatusCode::BAD_REQUEST, "cid_not_found"),
            ServerError::InvalidBehavior { .. } => (StatusCode::BAD_REQUEST, "invalid_behavior"),
            ServerError::CallNotFound { .. } => (StatusCode::NOT_FOUND, "call_not_found"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        let body = match &self {
            ServerError::CidNotFound { missing_cids } => json!({
                "error": discriminant,
                "missing_cids": missing_cids,
            }),
            other => json!({"error": discriminant, "detail": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}
