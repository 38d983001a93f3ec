use std::path::PathBuf;

/// Resolve the port-discovery file path the client should read, per spec
/// §4.I: `CIDELDILL_PORT_FILE` first, then `CIDELDILL_HOME`, then
/// `$HOME/.cideldill/port`.
pub fn discovery_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CIDELDILL_PORT_FILE") {
        return Some(PathBuf::from(path));
    }
    if let Ok(home) = std::env::var("CIDELDILL_HOME") {
        return Some(PathBuf::from(home).join("port"));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".cideldill").join("port"))
}

/// Read and parse the discovered port. `None` on any failure — the caller
/// falls back to the compiled-in default server URL.
pub fn read_port() -> Option<u16> {
    let path = discovery_file_path()?;
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
