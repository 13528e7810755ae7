//! Local visitor identity and the identify state machine.
//!
//! ```text
//!   Anonymous ──identify──► Identifying ──2xx──► Identified
//!       ▲                        │                   │
//!       └────────── failure ─────┘ (restore snapshot)│
//!       └──────────────────── reset_user ────────────┘
//! ```
//!
//! `identify` writes the new identity before its request is confirmed so
//! that events sent in the meantime already carry it. [`PendingIdentify`]
//! is the compensating half: dropping it without a commit restores the
//! snapshot taken before the write.

use crate::storage::{Storage, KEY_DISPLAY_NAME, KEY_IDENTIFIER};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Who the current visitor is, as far as this client knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub identifier: String,
    pub display_name: Option<String>,
}

/// Where the identity state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    Anonymous,
    Identifying,
    Identified,
}

/// Owns the persisted identity and the in-flight identify flag.
pub(crate) struct IdentityManager {
    store: Arc<dyn Storage>,
    identifying: AtomicBool,
}

impl IdentityManager {
    pub(crate) fn new(store: Arc<dyn Storage>) -> Self {
        Self {
            store,
            identifying: AtomicBool::new(false),
        }
    }

    /// The persisted identity, if any.
    pub(crate) fn current(&self) -> Option<Identity> {
        let identifier = self.store.get(KEY_IDENTIFIER).filter(|id| !id.is_empty())?;
        let display_name = self.store.get(KEY_DISPLAY_NAME).filter(|n| !n.is_empty());
        Some(Identity {
            identifier,
            display_name,
        })
    }

    pub(crate) fn is_identifying(&self) -> bool {
        self.identifying.load(Ordering::SeqCst)
    }

    pub(crate) fn state(&self) -> IdentityState {
        if self.is_identifying() {
            IdentityState::Identifying
        } else if self.current().is_some() {
            IdentityState::Identified
        } else {
            IdentityState::Anonymous
        }
    }

    /// Start an identify: take the flag and write `identity` optimistically.
    ///
    /// Returns `None` if another identify is still in flight. An empty
    /// display name is stored as no display name.
    pub(crate) fn begin(&self, mut identity: Identity) -> Option<PendingIdentify<'_>> {
        if self.identifying.swap(true, Ordering::SeqCst) {
            return None;
        }
        identity.display_name = identity.display_name.filter(|n| !n.is_empty());

        let previous = self.current();
        self.write(Some(&identity));
        debug!(identifier = %identity.identifier, "identity written optimistically");

        Some(PendingIdentify {
            manager: self,
            previous,
            written: identity,
            settled: false,
        })
    }

    /// Forget the local identity. Does not touch the in-flight flag.
    pub(crate) fn clear(&self) {
        self.write(None);
    }

    fn write(&self, identity: Option<&Identity>) {
        match identity {
            Some(identity) => {
                self.store.set(KEY_IDENTIFIER, &identity.identifier);
                match &identity.display_name {
                    Some(name) => self.store.set(KEY_DISPLAY_NAME, name),
                    None => self.store.remove(KEY_DISPLAY_NAME),
                }
            }
            None => {
                self.store.remove(KEY_IDENTIFIER);
                self.store.remove(KEY_DISPLAY_NAME);
            }
        }
    }
}

/// An identify whose request has not been confirmed yet.
///
/// Holds the in-flight flag until it is committed or rolled back; dropping
/// it unsettled counts as a failure.
pub(crate) struct PendingIdentify<'a> {
    manager: &'a IdentityManager,
    previous: Option<Identity>,
    written: Identity,
    settled: bool,
}

impl PendingIdentify<'_> {
    /// The collector accepted the identity.
    pub(crate) fn commit(mut self) {
        self.settled = true;
        self.manager.identifying.store(false, Ordering::SeqCst);
    }

    /// The collector did not accept the identity; restore the snapshot.
    pub(crate) fn rollback(mut self) {
        self.undo();
    }

    fn undo(&mut self) {
        self.settled = true;
        // a reset that landed mid-flight already replaced our write
        if self.manager.current().as_ref() == Some(&self.written) {
            self.manager.write(self.previous.as_ref());
            debug!(
                restored = self.previous.is_some(),
                "optimistic identity rolled back"
            );
        }
        self.manager.identifying.store(false, Ordering::SeqCst);
    }
}

impl Drop for PendingIdentify<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.undo();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn identity(id: &str, name: Option<&str>) -> Identity {
        Identity {
            identifier: id.into(),
            display_name: name.map(String::from),
        }
    }

    fn manager() -> (IdentityManager, MemoryStorage) {
        let store = MemoryStorage::new();
        (IdentityManager::new(Arc::new(store.clone())), store)
    }

    #[test]
    fn test_begin_writes_optimistically() {
        let (manager, store) = manager();
        assert_eq!(manager.state(), IdentityState::Anonymous);

        let pending = manager.begin(identity("u1", Some("Jane"))).unwrap();

        assert_eq!(manager.state(), IdentityState::Identifying);
        assert_eq!(store.get(KEY_IDENTIFIER), Some("u1".into()));
        assert_eq!(store.get(KEY_DISPLAY_NAME), Some("Jane".into()));

        pending.commit();
        assert_eq!(manager.state(), IdentityState::Identified);
    }

    #[test]
    fn test_second_begin_is_rejected_while_in_flight() {
        let (manager, _) = manager();
        let pending = manager.begin(identity("u1", None)).unwrap();

        assert!(manager.begin(identity("u2", None)).is_none());
        assert_eq!(manager.current(), Some(identity("u1", None)));

        pending.commit();
        assert!(manager.begin(identity("u2", None)).is_some());
    }

    #[test]
    fn test_rollback_from_anonymous_clears_everything() {
        let (manager, store) = manager();
        manager.begin(identity("u1", Some("Jane"))).unwrap().rollback();

        assert_eq!(store.get(KEY_IDENTIFIER), None);
        assert_eq!(store.get(KEY_DISPLAY_NAME), None);
        assert_eq!(manager.state(), IdentityState::Anonymous);
    }

    #[test]
    fn test_rollback_restores_previous_identity() {
        let (manager, _) = manager();
        manager.begin(identity("u0", Some("Old"))).unwrap().commit();

        manager.begin(identity("u1", None)).unwrap().rollback();

        assert_eq!(manager.current(), Some(identity("u0", Some("Old"))));
        assert_eq!(manager.state(), IdentityState::Identified);
    }

    #[test]
    fn test_rollback_keeps_reset_that_happened_mid_flight() {
        let (manager, _) = manager();
        manager.begin(identity("u0", None)).unwrap().commit();

        let pending = manager.begin(identity("u1", None)).unwrap();
        manager.clear();
        pending.rollback();

        assert_eq!(manager.current(), None);
        assert!(!manager.is_identifying());
    }

    #[test]
    fn test_dropped_pending_rolls_back() {
        let (manager, _) = manager();
        {
            let _pending = manager.begin(identity("u1", None)).unwrap();
        }

        assert_eq!(manager.current(), None);
        assert!(!manager.is_identifying());
    }

    #[test]
    fn test_rollback_with_empty_display_name() {
        let (manager, store) = manager();
        let pending = manager.begin(identity("u1", Some(""))).unwrap();
        assert_eq!(store.get(KEY_DISPLAY_NAME), None);

        pending.rollback();

        assert_eq!(store.get(KEY_IDENTIFIER), None);
        assert_eq!(manager.state(), IdentityState::Anonymous);
    }

    #[test]
    fn test_missing_display_name_removes_stale_one() {
        let (manager, store) = manager();
        manager.begin(identity("u0", Some("Old"))).unwrap().commit();
        manager.begin(identity("u1", None)).unwrap().commit();

        assert_eq!(store.get(KEY_DISPLAY_NAME), None);
    }
}
