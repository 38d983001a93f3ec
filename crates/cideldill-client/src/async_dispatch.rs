use std::collections::BTreeMap;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::proxy::ProxyResult;

pub type BoxedProxyFuture = Pin<Box<dyn Future<Output = ProxyResult> + Send>>;

/// Async counterpart to [`crate::dispatch::DispatchTable`].
pub type AsyncCallable = dyn Fn(Vec<Value>, BTreeMap<String, Value>) -> BoxedProxyFuture + Send + Sync;

#[derive(Default)]
pub struct AsyncDispatchTable {
    entries: RwLock<HashMap<String, Arc<AsyncCallable>>>,
}

impl AsyncDispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        name: impl Into<String>,
        callable: impl Fn(Vec<Value>, BTreeMap<String, Value>) -> BoxedProxyFuture + Send + Sync + 'static,
    ) {
        self.entries.write().insert(name.into(), Arc::new(callable));
    }

    pub fn get(&self, name: &str) -> Option<Arc<AsyncCallable>> {
        self.entries.read().get(name).cloned()
    }
}
