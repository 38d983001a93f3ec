use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::config::{validate_localhost, ClientConfig};
use crate::error::ClientError;

/// Process-global debug configuration (spec §9 "Global mutable state").
///
/// Modeled as a process-scoped singleton behind an explicit initializer, not
/// hidden inside function-level closures: any part of the process can call
/// [`configure`] or [`set_mode`] and observe the same state.
#[derive(Debug, Clone, Default)]
struct DebugState {
    enabled: bool,
    server_url: Option<String>,
}

fn state() -> &'static Mutex<DebugState> {
    static STATE: OnceLock<Mutex<DebugState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(DebugState::default()))
}

/// Configure the server URL before enabling debug mode.
pub fn configure(server_url: impl Into<String>) -> Result<(), ClientError> {
    let server_url = server_url.into();
    validate_localhost(&server_url)?;
    state().lock().server_url = Some(server_url);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Enabled,
    Disabled,
}

/// Toggle debug mode, mirroring `with_debug("ON"/"OFF")`.
pub fn set_mode(mode: Mode) {
    state().lock().enabled = mode == Mode::Enabled;
}

pub fn is_enabled() -> bool {
    state().lock().enabled
}

/// Resolve the server URL: explicit `configure()` call, else
/// `CIDELDILL_SERVER_URL`, else the port-discovery file, else the
/// compiled-in default.
pub fn resolve_server_url() -> Result<String, ClientError> {
    if let Some(url) = state().lock().server_url.clone() {
        return Ok(url);
    }
    if let Ok(url) = std::env::var("CIDELDILL_SERVER_URL") {
        validate_localhost(&url)?;
        return Ok(url);
    }
    if let Some(port) = crate::port_discovery::read_port() {
        return Ok(format!("http://localhost:{port}"));
    }
    Ok("http://localhost:5174".to_string())
}

pub fn build_config() -> Result<ClientConfig, ClientError> {
    ClientConfig::new(resolve_server_url()?)
}
