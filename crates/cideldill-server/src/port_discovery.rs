use std::path::PathBuf;

/// Resolve the port-discovery file path the server writes to, per spec
/// §4.I: `CIDELDILL_HOME` when set, else `$HOME/.cideldill/port`. Unlike
/// the client, the server does not consult `CIDELDILL_PORT_FILE` — it owns
/// the well-known file, it doesn't redirect to an arbitrary one.
pub fn discovery_file_path() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("CIDELDILL_HOME") {
        return Some(PathBuf::from(home).join("port"));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".cideldill").join("port"))
}

/// Write the bound port to the well-known file. No locking: last writer
/// wins, matching the source implementation's `port_discovery.py`. Errors
/// are logged and otherwise swallowed — a debuggee that can't find the
/// file falls back to the compiled-in default server URL.
pub fn write_port(port: u16) {
    let Some(path) = discovery_file_path() else {
        tracing::warn!("no HOME or CIDELDILL_HOME set; skipping port-discovery file");
        return;
    };
    if let Some(parent) = path.parent() {
        if let Err(source) = std::fs::create_dir_all(parent) {
            tracing::warn!(%source, path = %parent.display(), "failed to create port-discovery directory");
            return;
        }
    }
    if let Err(source) = std::fs::write(&path, port.to_string()) {
        tracing::warn!(%source, path = %path.display(), "failed to write port-discovery file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_under_cideldill_home_when_set() {
        std::env::set_var("CIDELDILL_HOME", "/tmp/cideldill-test-home");
        assert_eq!(discovery_file_path(), Some(PathBuf::from("/tmp/cideldill-test-home/port")));
        std::env::remove_var("CIDELDILL_HOME");
    }

    #[test]
    fn write_port_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::env::set_var("CIDELDILL_HOME", dir.path().join("nested"));
        write_port(4242);
        let contents = std::fs::read_to_string(dir.path().join("nested").join("port")).expect("port file");
        assert_eq!(contents, "4242");
        std::env::remove_var("CIDELDILL_HOME");
    }
}
