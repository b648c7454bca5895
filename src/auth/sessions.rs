//! In-process session store: a per-client token to identity-marker map.
//! Login inserts, logout removes, the resolver only ever reads.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::auth::SessionContext;

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionContext>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionContext>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionContext>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session for the given identity and return its bearer token.
    pub fn create(&self, ctx: SessionContext) -> String {
        let token = Uuid::new_v4().to_string();
        self.write().insert(token.clone(), ctx);
        token
    }

    /// Snapshot of the identity markers behind a token, if the session exists.
    pub fn get(&self, token: &str) -> Option<SessionContext> {
        self.read().get(token).cloned()
    }

    /// Drop a session. Returns whether one existed.
    pub fn destroy(&self, token: &str) -> bool {
        self.write().remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_sessions_resolve_until_destroyed() {
        let store = SessionStore::new();
        let ctx = SessionContext {
            patient_id: Some(1),
            ..SessionContext::default()
        };
        let token = store.create(ctx.clone());

        assert_eq!(store.get(&token), Some(ctx));
        assert!(store.destroy(&token));
        assert_eq!(store.get(&token), None);
    }

    #[test]
    fn destroy_is_idempotent() {
        let store = SessionStore::new();
        let token = store.create(SessionContext::default());
        assert!(store.destroy(&token));
        assert!(!store.destroy(&token));
        assert!(!store.destroy("not-a-token"));
    }

    #[test]
    fn tokens_are_unique_per_session() {
        let store = SessionStore::new();
        let a = store.create(SessionContext::default());
        let b = store.create(SessionContext::default());
        assert_ne!(a, b);
    }
}
