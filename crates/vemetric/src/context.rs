//! Per-session context id.

use crate::storage::{Storage, KEY_CONTEXT_ID};
use std::sync::Arc;
use tracing::debug;

/// Hands out the browsing session's context id, creating it on first use.
#[derive(Clone)]
pub struct ContextProvider {
    session: Arc<dyn Storage>,
}

impl ContextProvider {
    pub fn new(session: Arc<dyn Storage>) -> Self {
        Self { session }
    }

    /// Return the session's context id, generating and storing one if absent.
    pub fn context_id(&self) -> String {
        if let Some(id) = self.session.get(KEY_CONTEXT_ID).filter(|id| !id.is_empty()) {
            return id;
        }

        let id = generate_context_id();
        debug!(context_id = %id, "created session context");
        self.session.set(KEY_CONTEXT_ID, &id);
        id
    }
}

/// Digits of a random fraction in `[0, 1)`. A dedup key, not a secret.
fn generate_context_id() -> String {
    let fraction: f64 = rand::random();
    let rendered = fraction.to_string();
    let digits = rendered.strip_prefix("0.").unwrap_or(&rendered);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return "0".into();
    }
    digits.to_string()
}
