pub mod behavior;
pub mod breakpoints;
pub mod call;
pub mod com_errors;
pub mod functions;
pub mod health;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/api/breakpoints", get(breakpoints::list).post(breakpoints::add))
        .route("/api/breakpoints/:name", delete(breakpoints::remove))
        .route("/api/breakpoints/:name/behavior", post(breakpoints::set_behavior))
        .route(
            "/api/breakpoints/:name/after_behavior",
            post(breakpoints::set_after_behavior),
        )
        .route(
            "/api/breakpoints/:name/replacement",
            post(breakpoints::set_replacement),
        )
        .route("/api/breakpoints/:name/history", get(breakpoints::history))
        .route("/api/behavior", get(behavior::get).post(behavior::set))
        .route("/api/functions", get(functions::list).post(functions::register))
        .route("/api/call/start", post(call::start))
        .route("/api/call/complete", post(call::complete))
        .route("/api/call/event", post(call::event))
        .route("/api/poll/:pause_id", get(call::poll))
        .route("/api/paused", get(call::list_paused))
        .route("/api/paused/:pause_id/continue", post(call::resume))
        .route("/api/report-com-error", post(com_errors::report))
        .route("/api/com-errors", get(com_errors::list))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
