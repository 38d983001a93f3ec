use axum::extract::{Path, State};
use axum::Json;
use base64::Engine;
use cideldill_codec::Cid;
use cideldill_protocol::{
    Action, CallData, CompleteRequest, CompleteResponse, PausedExecution, PollResponse,
    SerializedItem, StartResponse, TimelineEvent, TimelineEventRequest,
};
use cideldill_store::CidStore;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::AppState;

/// Every `SerializedItem` a `CallData` envelope carries: the target and all
/// positional/keyword arguments.
fn items(call_data: &CallData) -> Vec<&SerializedItem> {
    let mut all = vec![&call_data.target];
    all.extend(call_data.args.iter());
    all.extend(call_data.kwargs.values());
    all
}

/// Persist every item that arrived with inline `data`, and report any
/// reference-only item whose cid the store has never seen.
fn ingest(store: &dyn CidStore, call_data: &CallData) -> Result<Vec<Cid>, ServerError> {
    let mut references = Vec::new();
    for item in items(call_data) {
        match &item.data {
            Some(data) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .map_err(|source| ServerError::BadRequest(format!("invalid base64 in serialized item: {source}")))?;
                store.store(&item.cid, &bytes)?;
            }
            None => references.push(item.cid.clone()),
        }
    }
    Ok(store.missing(&references)?)
}

pub async fn start(
    State(state): State<AppState>,
    Json(call_data): Json<CallData>,
) -> Result<Json<StartResponse>, ServerError> {
    let missing_cids = ingest(state.store.as_ref(), &call_data)?;
    if !missing_cids.is_empty() {
        return Err(ServerError::CidNotFound { missing_cids });
    }
    Ok(Json(state.manager.start_call(call_data)))
}

pub async fn poll(State(state): State<AppState>, Path(pause_id): Path<Uuid>) -> Json<PollResponse> {
    Json(state.manager.poll(pause_id))
}

pub async fn complete(
    State(state): State<AppState>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ServerError> {
    if let Some(item) = request.result.as_ref() {
        ingest_single(state.store.as_ref(), item)?;
    }
    if let Some(exception) = request.exception.as_ref() {
        if let Some(traceback) = exception.traceback.as_ref() {
            ingest_single(state.store.as_ref(), traceback)?;
        }
    }
    let response = state.manager.complete_call(
        &request.call_id,
        request.status,
        request.result,
        request.exception,
    )?;
    Ok(Json(response))
}

fn ingest_single(store: &dyn CidStore, item: &SerializedItem) -> Result<(), ServerError> {
    if let Some(data) = &item.data {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|source| ServerError::BadRequest(format!("invalid base64 in serialized item: {source}")))?;
        store.store(&item.cid, &bytes)?;
    }
    Ok(())
}

pub async fn event(State(state): State<AppState>, Json(request): Json<TimelineEventRequest>) -> Json<Value> {
    state.manager.record_event(TimelineEvent {
        recorded_at: cideldill_protocol::unix_timestamp(),
        kind: request.kind,
        process_key: request.process_key,
        detail: request.detail,
    });
    Json(json!({"ok": true}))
}

pub async fn list_paused(State(state): State<AppState>) -> Json<Vec<PausedExecution>> {
    Json(state.manager.list_paused())
}

pub async fn resume(
    State(state): State<AppState>,
    Path(pause_id): Path<Uuid>,
    Json(action): Json<Action>,
) -> Result<Json<Value>, ServerError> {
    state.manager.resume(pause_id, action)?;
    Ok(Json(json!({"ok": true})))
}
