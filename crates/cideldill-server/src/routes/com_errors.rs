use axum::extract::State;
use axum::Json;
use cideldill_protocol::{unix_timestamp, ComError, ReportComErrorRequest};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn report(State(state): State<AppState>, Json(request): Json<ReportComErrorRequest>) -> Json<Value> {
    state.manager.report_com_error(ComError {
        reported_at: unix_timestamp(),
        process_key: request.process_key,
        call_id: request.call_id,
        summary: request.summary,
        detail: request.detail,
    });
    Json(json!({"ok": true}))
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<ComError>> {
    Json(state.manager.com_errors())
}
