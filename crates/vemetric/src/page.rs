//! Host page adapter.
//!
//! The client never touches a document directly. The host implements
//! [`Page`] to expose the current location and referrer, and forwards
//! navigation, click and unload signals to the [`PageListener`]s attached
//! to it. Adapters that wrap a history-push entry point must let the
//! wrapped call run before notifying.

use std::sync::{Arc, Mutex, MutexGuard};

/// Which navigation signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// A history entry was pushed programmatically.
    PushState,
    /// Back/forward navigation.
    PopState,
    /// Same-document anchor change.
    HashChange,
}

/// The element a click landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    /// Upper-case tag name, e.g. `A`.
    pub tag_name: String,
    /// Raw `href` attribute, possibly relative.
    pub href: Option<String>,
}

impl ClickTarget {
    /// An anchor with the given `href`.
    pub fn anchor(href: impl Into<String>) -> Self {
        Self {
            tag_name: "A".into(),
            href: Some(href.into()),
        }
    }

    /// Any other element.
    pub fn element(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            href: None,
        }
    }

    pub fn is_anchor(&self) -> bool {
        self.tag_name.eq_ignore_ascii_case("a")
    }
}

/// Signal groups a listener wants delivered. Unload is always delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Subscription {
    pub navigation: bool,
    pub clicks: bool,
}

/// Receives page signals from the host.
pub trait PageListener: Send + Sync {
    fn on_navigation(&self, navigation: Navigation);
    fn on_click(&self, target: &ClickTarget);
    fn on_unload(&self);
}

/// The host page.
pub trait Page: Send + Sync {
    /// Absolute URL of the current document.
    fn url(&self) -> String;

    /// The document referrer, if any.
    fn referrer(&self) -> Option<String>;

    /// Start forwarding the subscribed signals to `listener`.
    fn attach(&self, listener: Arc<dyn PageListener>, subscription: Subscription);
}

/// In-memory [`Page`] for hosts without a real document, and for tests.
#[derive(Clone, Default)]
pub struct HeadlessPage {
    state: Arc<Mutex<HeadlessState>>,
}

#[derive(Default)]
struct HeadlessState {
    url: String,
    referrer: Option<String>,
    listeners: Vec<(Arc<dyn PageListener>, Subscription)>,
}

impl HeadlessPage {
    pub fn new(url: impl Into<String>) -> Self {
        let page = Self::default();
        page.state().url = url.into();
        page
    }

    pub fn with_referrer(self, referrer: impl Into<String>) -> Self {
        self.state().referrer = Some(referrer.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    pub fn set_referrer(&self, referrer: Option<String>) {
        self.state().referrer = referrer;
    }

    /// Change the URL without notifying anyone, like a full page load would.
    pub fn set_url(&self, url: impl Into<String>) {
        self.state().url = url.into();
    }

    /// Push a history entry, then notify.
    pub fn push_state(&self, url: impl Into<String>) {
        self.set_url(url);
        self.navigate(Navigation::PushState);
    }

    /// Go back or forward to `url`, then notify.
    pub fn pop_state(&self, url: impl Into<String>) {
        self.set_url(url);
        self.navigate(Navigation::PopState);
    }

    /// Change the fragment to `url`, then notify.
    pub fn hash_change(&self, url: impl Into<String>) {
        self.set_url(url);
        self.navigate(Navigation::HashChange);
    }

    /// Deliver a click on `target`.
    pub fn click(&self, target: &ClickTarget) {
        for listener in self.subscribed(|s| s.clicks) {
            listener.on_click(target);
        }
    }

    /// Deliver page teardown.
    pub fn unload(&self) {
        for listener in self.subscribed(|_| true) {
            listener.on_unload();
        }
    }

    fn navigate(&self, navigation: Navigation) {
        for listener in self.subscribed(|s| s.navigation) {
            listener.on_navigation(navigation);
        }
    }

    // Listeners run outside the lock so they may read the page.
    fn subscribed(&self, wants: impl Fn(&Subscription) -> bool) -> Vec<Arc<dyn PageListener>> {
        self.state()
            .listeners
            .iter()
            .filter(|(_, s)| wants(s))
            .map(|(l, _)| l.clone())
            .collect()
    }
}

impl Page for HeadlessPage {
    fn url(&self) -> String {
        self.state().url.clone()
    }

    fn referrer(&self) -> Option<String> {
        self.state().referrer.clone()
    }

    fn attach(&self, listener: Arc<dyn PageListener>, subscription: Subscription) {
        self.state().listeners.push((listener, subscription));
    }
}

impl std::fmt::Debug for HeadlessPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("HeadlessPage")
            .field("url", &state.url)
            .field("referrer", &state.referrer)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}
