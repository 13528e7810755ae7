//! Automatic page view, outbound link and page leave tracking.

use crate::client::Tracker;
use crate::page::{ClickTarget, Navigation, PageListener};
use reqwest::Url;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Listener the client attaches to the host page.
///
/// Holds the tracker weakly and goes quiet once the client shuts down.
pub(crate) struct Instrumentation {
    tracker: Weak<Tracker>,
}

impl Instrumentation {
    pub(crate) fn new(tracker: Weak<Tracker>) -> Self {
        Self { tracker }
    }

    fn tracker(&self) -> Option<Arc<Tracker>> {
        self.tracker.upgrade().filter(|t| t.is_active())
    }
}

impl PageListener for Instrumentation {
    fn on_navigation(&self, navigation: Navigation) {
        if let Some(tracker) = self.tracker() {
            trace!(?navigation, "navigation signal");
            tracker.spawn_page_view();
        }
    }

    fn on_click(&self, target: &ClickTarget) {
        if let Some(tracker) = self.tracker() {
            tracker.track_outbound_click(target);
        }
    }

    fn on_unload(&self) {
        if let Some(tracker) = self.tracker() {
            tracker.track_page_leave();
        }
    }
}

/// Resolve a clicked anchor against the current page; `Some` only when it
/// leads to another origin.
pub(crate) fn outbound_destination(target: &ClickTarget, current_url: &str) -> Option<Url> {
    if !target.is_anchor() {
        return None;
    }
    let href = target.href.as_deref().filter(|h| !h.is_empty())?;

    let base = Url::parse(current_url).ok()?;
    let destination = base.join(href).ok()?;

    (destination.origin() != base.origin()).then_some(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://x.test/docs/intro";

    #[test]
    fn test_other_origin_is_outbound() {
        let dest = outbound_destination(&ClickTarget::anchor("https://other.test/p?q=1"), PAGE);
        assert_eq!(dest.unwrap().as_str(), "https://other.test/p?q=1");
    }

    #[test]
    fn test_relative_links_stay_internal() {
        assert!(outbound_destination(&ClickTarget::anchor("../pricing"), PAGE).is_none());
        assert!(outbound_destination(&ClickTarget::anchor("#section"), PAGE).is_none());
        assert!(outbound_destination(&ClickTarget::anchor("/"), PAGE).is_none());
    }

    #[test]
    fn test_scheme_or_port_change_is_outbound() {
        assert!(outbound_destination(&ClickTarget::anchor("http://x.test/"), PAGE).is_some());
        assert!(outbound_destination(&ClickTarget::anchor("https://x.test:8443/"), PAGE).is_some());
        assert!(outbound_destination(&ClickTarget::anchor("//cdn.test/lib.js"), PAGE).is_some());
    }

    #[test]
    fn test_non_anchor_or_missing_href_ignored() {
        assert!(outbound_destination(&ClickTarget::element("BUTTON"), PAGE).is_none());
        assert!(outbound_destination(
            &ClickTarget {
                tag_name: "A".into(),
                href: None
            },
            PAGE
        )
        .is_none());
        assert!(outbound_destination(&ClickTarget::anchor(""), PAGE).is_none());
    }
}
