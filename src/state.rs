//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::storage::PhotoStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    photo_store: PhotoStore,
}

impl AppState {
    pub fn new(config: Config, photo_store: PhotoStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                photo_store,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the photo store
    pub fn photo_store(&self) -> &PhotoStore {
        &self.inner.photo_store
    }
}
