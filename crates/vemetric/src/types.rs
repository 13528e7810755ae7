//! Payload types and serialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name used for page views.
pub const EVENT_PAGE_VIEW: &str = "$$pageView";

/// Event name used for the page-leave beacon.
pub const EVENT_PAGE_LEAVE: &str = "$$pageLeave";

/// Event name used for outbound link clicks.
pub const EVENT_OUTBOUND_LINK: &str = "$$outboundLink";

/// Collector paths, relative to the configured host.
pub mod paths {
    pub const EVENT: &str = "/e";
    pub const IDENTIFY: &str = "/i";
    pub const UPDATE_USER: &str = "/u";
    pub const RESET: &str = "/r";
    pub const LEAVE: &str = "/l";
}

/// Instructions for mutating the stored user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_once: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unset: Option<Vec<String>>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a profile field.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Write a profile field only if it has no value yet.
    pub fn set_once(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_once
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Remove a profile field.
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.unset.get_or_insert_with(Vec::new).push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_none() && self.set_once.is_none() && self.unset.is_none()
    }
}

/// Body of `/e` and `/l`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub url: String,
    pub context_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
}

/// Body of `/i`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<UserData>,
}

/// Body of `/u`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateUserPayload {
    pub data: UserData,
}
