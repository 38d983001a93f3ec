use axum::extract::{Path, Query, State};
use axum::Json;
use cideldill_manager::BreakpointsSnapshot;
use cideldill_protocol::{Behavior, ExecutionRecord};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServerError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<BreakpointsSnapshot> {
    Json(state.manager.list_breakpoints())
}

#[derive(Debug, Deserialize)]
pub struct AddBreakpointRequest {
    pub function_name: String,
    #[serde(default)]
    pub behavior: Option<Behavior>,
    #[serde(default)]
    pub signature: Option<String>,
}

pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<AddBreakpointRequest>,
) -> Result<Json<Value>, ServerError> {
    state.manager.add_breakpoint(&request.function_name);
    if let Some(signature) = request.signature {
        state.manager.register_function(&request.function_name, Some(signature));
    }
    if let Some(behavior) = request.behavior {
        state.manager.set_before_behavior(&request.function_name, behavior)?;
    }
    Ok(Json(json!({"ok": true})))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ServerError> {
    state.manager.remove_breakpoint(&name)?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct BehaviorRequest {
    pub behavior: Behavior,
}

pub async fn set_behavior(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<BehaviorRequest>,
) -> Result<Json<Value>, ServerError> {
    state.manager.set_before_behavior(&name, request.behavior)?;
    Ok(Json(json!({"ok": true})))
}

pub async fn set_after_behavior(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<BehaviorRequest>,
) -> Result<Json<Value>, ServerError> {
    state.manager.set_after_behavior(&name, request.behavior)?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct ReplacementRequest {
    pub replacement_function: Option<String>,
}

pub async fn set_replacement(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<ReplacementRequest>,
) -> Result<Json<Value>, ServerError> {
    match request.replacement_function {
        Some(replacement) => state.manager.set_replacement(&name, &replacement)?,
        None => state.manager.clear_replacement(&name),
    }
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<ExecutionRecord>> {
    Json(state.manager.history(&name, query.limit))
}
