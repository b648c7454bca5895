use crate::auth::sessions::SessionStore;
use crate::core::db::DbPool;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> Self {
        Self {
            db_pool,
            sessions: SessionStore::new(),
        }
    }
}
