//! Shared application state for all routes.

use crate::schema::SchemaRegistry;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<SchemaRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        AppState {
            store,
            registry: Arc::new(SchemaRegistry::new()),
        }
    }
}
