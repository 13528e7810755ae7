//! Key/value persistence used for identity and session state.

use crate::config::IdentityScope;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage key for the visitor identifier.
pub const KEY_IDENTIFIER: &str = "_vmId";

/// Storage key for the visitor display name.
pub const KEY_DISPLAY_NAME: &str = "_vmDn";

/// Storage key for the session context id.
pub const KEY_CONTEXT_ID: &str = "_vmCtx";

/// String key/value store provided by the host.
///
/// Implementations back onto whatever the host has: browser storage,
/// a file, or plain memory.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory [`Storage`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// The two stores a client needs: one durable, one scoped to the browsing session.
#[derive(Clone)]
pub struct Stores {
    pub durable: Arc<dyn Storage>,
    pub session: Arc<dyn Storage>,
}

impl Stores {
    pub fn new(durable: Arc<dyn Storage>, session: Arc<dyn Storage>) -> Self {
        Self { durable, session }
    }

    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        )
    }

    /// The store holding identity for the given scope.
    pub(crate) fn for_identity(&self, scope: IdentityScope) -> Arc<dyn Storage> {
        match scope {
            IdentityScope::Durable => self.durable.clone(),
            IdentityScope::Session => self.session.clone(),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
