use std::sync::Arc;

use crate::config::AppConfig;

/// The shared application state.
///
/// Cloned into every handler and the stateful middleware. The pool is
/// opened and initialized before an `AppState` can be built.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        Self { db, config: Arc::new(config) }
    }
}
