use axum::extract::State;
use axum::Json;
use cideldill_protocol::DefaultBehavior;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DefaultBehaviorResponse {
    pub default_behavior: DefaultBehavior,
}

pub async fn get(State(state): State<AppState>) -> Json<DefaultBehaviorResponse> {
    Json(DefaultBehaviorResponse { default_behavior: state.manager.default_behavior() })
}

#[derive(Debug, Deserialize)]
pub struct SetDefaultBehaviorRequest {
    pub default_behavior: DefaultBehavior,
}

pub async fn set(
    State(state): State<AppState>,
    Json(request): Json<SetDefaultBehaviorRequest>,
) -> Json<DefaultBehaviorResponse> {
    state.manager.set_default_behavior(request.default_behavior);
    Json(DefaultBehaviorResponse { default_behavior: request.default_behavior })
}
