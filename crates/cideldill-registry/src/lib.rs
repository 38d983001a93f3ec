#![forbid(unsafe_code)]
//! Debuggee-local function registry (spec §4.C).
//!
//! Rust has no universal callable handle the way the source runtime's
//! `Callable[..., object]` does, so this registry tracks *that* a name is
//! locally resolvable and its advisory signature. Actual dispatch back to a
//! Rust function goes through a caller-supplied dispatch table (see
//! `cideldill-client::proxy`), which this registry validates against.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
struct Entry {
    signature: Option<String>,
}

/// Thread-safe map of logical function name to its advisory signature.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as locally resolvable, with an optional signature
    /// used to validate `replace` actions.
    pub fn register(&self, name: impl Into<String>, signature: Option<String>) {
        self.entries.write().insert(name.into(), Entry { signature });
    }

    /// Whether `name` is locally resolvable.
    pub fn lookup(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn signature_of(&self, name: &str) -> Option<String> {
        self.entries.read().get(name).and_then(|e| e.signature.clone())
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}
