use std::sync::Arc;

use cideldill_manager::Manager;
use cideldill_store::CidStore;

/// Shared state handed to every axum handler. Cheap to clone: both fields
/// are `Arc`s, and `Manager`/the store guard their own state internally
/// (spec §5's single-coarse-mutex-per-resource rule). The store is held as
/// `Arc<dyn CidStore>` so a handler never depends on which backend is live.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
    pub store: Arc<dyn CidStore>,
}

impl AppState {
    pub fn new(manager: Arc<Manager>, store: Arc<dyn CidStore>) -> Self {
        AppState { manager, store }
    }
}
