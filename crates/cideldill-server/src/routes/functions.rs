use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use cideldill_protocol::FunctionRegistration;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<HashMap<String, FunctionRegistration>> {
    Json(state.manager.list_functions())
}

#[derive(Debug, Deserialize)]
pub struct RegisterFunctionRequest {
    pub name: String,
    #[serde(default)]
    pub signature: Option<String>,
}

pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterFunctionRequest>) -> Json<Value> {
    state.manager.register_function(&request.name, request.signature);
    Json(json!({"ok": true}))
}
