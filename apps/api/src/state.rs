use std::sync::Arc;

use crate::config::Config;
use crate::store::ProfileStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable profile store. Postgres by default; swap via PROFILE_STORE.
    pub store: Arc<dyn ProfileStore>,
    pub config: Config,
}
