use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::proxy::ProxyResult;

/// A locally resolvable callable, keyed by its registered name. Used to
/// dispatch `replace` actions (spec §4.G's action-transition table).
pub type Callable = dyn Fn(&[Value], &BTreeMap<String, Value>) -> ProxyResult + Send + Sync;

/// Debuggee-process-local table of callables a `replace` action may target.
///
/// Distinct from [`cideldill_registry::FunctionRegistry`], which only
/// records *that* a name is resolvable (for signature validation); this
/// table holds the actual dispatchable closures.
#[derive(Default)]
pub struct DispatchTable {
    entries: RwLock<HashMap<String, Arc<Callable>>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, callable: impl Fn(&[Value], &BTreeMap<String, Value>) -> ProxyResult + Send + Sync + 'static) {
        self.entries.write().insert(name.into(), Arc::new(callable));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Callable>> {
        self.entries.read().get(name).cloned()
    }
}
