#![forbid(unsafe_code)]
//! Server-side breakpoint state and pause scheduler (spec §4.E, §4.G).

mod error;
mod manager;
mod observer;
mod state;

pub use error::ManagerError;
pub use manager::{Manager, POLL_INTERVAL_MS, POLL_TIMEOUT_MS};
pub use observer::ManagerObserver;
pub use state::{BreakpointsSnapshot, ManagerState};
