#![forbid(unsafe_code)]

//! HTTP control plane for the breakpoint and call-interception service
//! (spec §4.F, §4.I): exposes `cideldill_manager::Manager` and a
//! `cideldill_store::CidStore` backend over an `axum` router, and writes
//! the server-side port-discovery file on startup.

pub mod cli;
pub mod error;
pub mod port_discovery;
pub mod routes;
pub mod state;

pub use error::ServerError;
pub use routes::router;
pub use state::AppState;
