//! Vemetric client implementation.

use crate::config::{Config, ConfigBuilder};
use crate::context::ContextProvider;
use crate::identity::{Identity, IdentityManager, IdentityState};
use crate::instrumentation::{outbound_destination, Instrumentation};
use crate::mask::mask_url;
use crate::page::{ClickTarget, Page, Subscription};
use crate::retry::retry;
use crate::storage::Stores;
use crate::transport::{effective_referrer, HttpTransport};
use crate::types::{
    paths, EventPayload, IdentifyPayload, UpdateUserPayload, UserData, EVENT_OUTBOUND_LINK,
    EVENT_PAGE_LEAVE, EVENT_PAGE_VIEW,
};
use crate::Error;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// Vemetric analytics client.
///
/// Created uninitialised; every call other than [`Vemetric::init`] fails
/// with [`Error::NotInitialized`] until `init` succeeds.
///
/// # Example
///
/// ```rust,no_run
/// use vemetric::{Config, HeadlessPage, Stores, UserData, Vemetric};
///
/// #[tokio::main]
/// async fn main() -> Result<(), vemetric::Error> {
///     let page = HeadlessPage::new("https://example.com/");
///     let client = Vemetric::new(page.clone(), Stores::in_memory());
///     client.init(Config::builder("pk_xxxxxx"))?;
///
///     client.identify("usr_123").display_name("Jane").send().await?;
///
///     client.track_event("signup")
///         .data("plan", "pro")
///         .send()
///         .await?;
///
///     client.update_user(UserData::new().set("plan", "pro")).await?;
///     client.shutdown();
///     Ok(())
/// }
/// ```
pub struct Vemetric {
    page: Arc<dyn Page>,
    stores: Stores,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Uninitialized,
    Running(Arc<Tracker>),
    Shutdown,
}

/// What an identify call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyOutcome {
    /// The collector confirmed the identity.
    Identified,
    /// Another identify was still in flight; nothing was sent.
    Skipped,
    /// The request failed and the optimistic write was undone.
    RolledBack { status: Option<u16> },
}

impl Vemetric {
    /// Create an uninitialised client for the given host page and stores.
    pub fn new(page: impl Page + 'static, stores: Stores) -> Self {
        Self {
            page: Arc::new(page),
            stores,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate and freeze the configuration, then start instrumentation.
    ///
    /// Calling this again after a successful init does nothing, whatever
    /// the new configuration says.
    #[instrument(skip_all)]
    pub fn init(&self, builder: ConfigBuilder) -> Result<(), Error> {
        let mut lifecycle = self.lifecycle();
        match &*lifecycle {
            Lifecycle::Running(_) => {
                debug!("already initialized");
                return Ok(());
            }
            Lifecycle::Shutdown => return Err(Error::Shutdown),
            Lifecycle::Uninitialized => {}
        }

        let config = builder.build_config()?;
        let transport = HttpTransport::new(&config)?;
        let identity = IdentityManager::new(self.stores.for_identity(config.identity_scope()));

        let tracker = Arc::new(Tracker {
            page: self.page.clone(),
            context: ContextProvider::new(self.stores.session.clone()),
            identity,
            transport,
            last_viewed_page: Mutex::new(None),
            active: AtomicBool::new(true),
            config,
        });

        self.page.attach(
            Arc::new(Instrumentation::new(Arc::downgrade(&tracker))),
            Subscription {
                navigation: tracker.config.track_page_views(),
                clicks: tracker.config.track_outbound_links(),
            },
        );
        if tracker.config.track_page_views() {
            tracker.spawn_page_view();
        }

        info!(
            host = %tracker.config.host(),
            track_page_views = tracker.config.track_page_views(),
            track_outbound_links = tracker.config.track_outbound_links(),
            "vemetric initialized"
        );
        *lifecycle = Lifecycle::Running(tracker);
        Ok(())
    }

    /// Whether `init` has succeeded and `shutdown` has not been called.
    pub fn is_initialized(&self) -> bool {
        matches!(&*self.lifecycle(), Lifecycle::Running(_))
    }

    /// Stop tracking and detach from the page. Later calls fail with [`Error::Shutdown`].
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Shutdown);
        if let Lifecycle::Running(tracker) = previous {
            info!("shutting down client");
            // in-flight sends may still hold the tracker
            tracker.active.store(false, Ordering::SeqCst);
        }
    }

    fn tracker(&self) -> Result<Arc<Tracker>, Error> {
        match &*self.lifecycle() {
            Lifecycle::Running(tracker) => Ok(tracker.clone()),
            Lifecycle::Uninitialized => Err(Error::NotInitialized),
            Lifecycle::Shutdown => Err(Error::Shutdown),
        }
    }

    /// Get the frozen configuration.
    pub fn config(&self) -> Result<Config, Error> {
        Ok(self.tracker()?.config.clone())
    }

    /// The browsing session's context id.
    pub fn context_id(&self) -> Result<String, Error> {
        Ok(self.tracker()?.context.context_id())
    }

    /// The locally stored identity.
    pub fn identity(&self) -> Result<Option<Identity>, Error> {
        Ok(self.tracker()?.identity.current())
    }

    /// Where the identity state machine stands.
    pub fn identity_state(&self) -> Result<IdentityState, Error> {
        Ok(self.tracker()?.identity.state())
    }

    // ============================================
    // TRACK
    // ============================================

    /// Report a page view for the current URL, unless it was the last one reported.
    pub async fn track_page_view(&self) -> Result<(), Error> {
        let tracker = self.tracker()?;
        if !tracker.mark_page_view() {
            return Ok(());
        }
        let payload = tracker.event_payload(EVENT_PAGE_VIEW, None, None);
        tracker.send_event(&payload).await
    }

    /// Track a custom event.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # async fn example(client: &vemetric::Vemetric) -> Result<(), vemetric::Error> {
    /// client.track_event("export")
    ///     .data("format", "csv")
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn track_event(&self, name: impl Into<String>) -> SendableEvent<'_> {
        SendableEvent {
            client: self,
            name: name.into(),
            custom_data: Map::new(),
            user_data: None,
        }
    }

    // ============================================
    // IDENTITY
    // ============================================

    /// Associate this visitor with a user.
    ///
    /// The identity is stored before the collector confirms it, so events
    /// sent meanwhile already carry it. If the collector rejects it, the
    /// previous identity is restored. While one identify is in flight,
    /// further calls are skipped.
    pub fn identify(&self, identifier: impl Into<String>) -> SendableIdentify<'_> {
        SendableIdentify {
            client: self,
            identifier: identifier.into(),
            display_name: None,
            data: None,
        }
    }

    /// Forget the local identity and tell the collector.
    #[instrument(skip(self))]
    pub async fn reset_user(&self) -> Result<(), Error> {
        let tracker = self.tracker()?;
        tracker.identity.clear();
        info!("user reset");
        tracker
            .transport
            .confirm(paths::RESET, None::<&()>, tracker.referrer().as_deref())
            .await
    }

    /// Mutate the stored user profile.
    ///
    /// Waits for an in-flight identify to settle first. If it does not
    /// settle within the configured retry budget the update is dropped and
    /// `Ok(())` is returned.
    #[instrument(skip_all)]
    pub async fn update_user(&self, data: UserData) -> Result<(), Error> {
        let tracker = self.tracker()?;
        let payload = UpdateUserPayload { data };
        let referrer = tracker.referrer();

        let sent = retry(
            tracker.config.update_retry(),
            || tracker.identity.is_identifying(),
            || {
                tracker
                    .transport
                    .confirm(paths::UPDATE_USER, Some(&payload), referrer.as_deref())
            },
        )
        .await;

        match sent {
            Some(result) => result,
            None => {
                debug!("identify still in flight, user update dropped");
                Ok(())
            }
        }
    }
}

// ============================================
// SENDABLE WRAPPERS
// ============================================

/// Sendable custom event builder.
pub struct SendableEvent<'a> {
    client: &'a Vemetric,
    name: String,
    custom_data: Map<String, Value>,
    user_data: Option<UserData>,
}

impl<'a> SendableEvent<'a> {
    /// Add a custom data field.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_data.insert(key.into(), value.into());
        self
    }

    /// Attach user profile changes to the event.
    pub fn user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    fn payload(self, tracker: &Tracker) -> EventPayload {
        let custom_data = (!self.custom_data.is_empty()).then_some(self.custom_data);
        tracker.event_payload(&self.name, custom_data, self.user_data)
    }

    /// Send the event and wait for the collector to accept it.
    pub async fn send(self) -> Result<(), Error> {
        let tracker = self.client.tracker()?;
        let payload = self.payload(&tracker);
        tracker.send_event(&payload).await
    }

    /// Send the event as a beacon: returns immediately, outcome unobserved.
    pub fn send_beacon(self) -> Result<(), Error> {
        let tracker = self.client.tracker()?;
        let payload = self.payload(&tracker);
        tracker
            .transport
            .beacon(paths::EVENT, Some(&payload), tracker.referrer().as_deref());
        Ok(())
    }
}

/// Sendable identify builder.
pub struct SendableIdentify<'a> {
    client: &'a Vemetric,
    identifier: String,
    display_name: Option<String>,
    data: Option<UserData>,
}

impl<'a> SendableIdentify<'a> {
    /// Set the name shown for this user.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Attach initial user profile data.
    pub fn data(mut self, data: UserData) -> Self {
        self.data = Some(data);
        self
    }

    /// Run the identify round-trip.
    ///
    /// Transport failures are absorbed: they roll the identity back and
    /// are reported as [`IdentifyOutcome::RolledBack`].
    #[instrument(skip(self), fields(identifier = %self.identifier))]
    pub async fn send(self) -> Result<IdentifyOutcome, Error> {
        let tracker = self.client.tracker()?;
        if self.identifier.is_empty() {
            return Err(Error::Config("identifier cannot be empty".into()));
        }

        let identity = Identity {
            identifier: self.identifier.clone(),
            display_name: self.display_name.clone(),
        };
        let Some(pending) = tracker.identity.begin(identity) else {
            debug!("identify already in flight, skipping");
            return Ok(IdentifyOutcome::Skipped);
        };

        let payload = IdentifyPayload {
            identifier: self.identifier,
            display_name: self.display_name,
            data: self.data,
        };
        let referrer = tracker.referrer();

        match tracker
            .transport
            .confirm(paths::IDENTIFY, Some(&payload), referrer.as_deref())
            .await
        {
            Ok(()) => {
                pending.commit();
                info!("user identified");
                Ok(IdentifyOutcome::Identified)
            }
            Err(e) => {
                warn!(error = %e, "identify failed, rolling back");
                pending.rollback();
                Ok(IdentifyOutcome::RolledBack { status: e.status() })
            }
        }
    }
}

// ============================================
// INTERNAL
// ============================================

/// State shared between the client and the page instrumentation.
pub(crate) struct Tracker {
    config: Config,
    page: Arc<dyn Page>,
    transport: HttpTransport,
    context: ContextProvider,
    identity: IdentityManager,
    last_viewed_page: Mutex<Option<String>>,
    active: AtomicBool,
}

impl Tracker {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn current_url(&self) -> String {
        mask_url(&self.page.url(), self.config.mask_paths())
    }

    fn referrer(&self) -> Option<String> {
        effective_referrer(self.page.referrer(), &self.page.url())
    }

    fn event_payload(
        &self,
        name: &str,
        custom_data: Option<Map<String, Value>>,
        user_data: Option<UserData>,
    ) -> EventPayload {
        let identity = self.identity.current();
        EventPayload {
            url: self.current_url(),
            context_id: self.context.context_id(),
            identifier: identity.as_ref().map(|i| i.identifier.clone()),
            display_name: identity.and_then(|i| i.display_name),
            name: name.to_string(),
            custom_data,
            user_data,
        }
    }

    /// Record the current URL as viewed. False if it already was the last one.
    fn mark_page_view(&self) -> bool {
        let url = self.page.url();
        let mut last = self
            .last_viewed_page
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if last.as_deref() == Some(url.as_str()) {
            debug!(url = %url, "page view suppressed, url unchanged");
            return false;
        }
        *last = Some(url);
        true
    }

    async fn send_event(&self, payload: &EventPayload) -> Result<(), Error> {
        self.transport
            .confirm(paths::EVENT, Some(payload), self.referrer().as_deref())
            .await
    }

    /// Page view from a navigation signal; runs the send in the background.
    pub(crate) fn spawn_page_view(self: &Arc<Self>) {
        if !self.mark_page_view() {
            return;
        }
        let payload = self.event_payload(EVENT_PAGE_VIEW, None, None);
        let tracker = self.clone();
        self.transport.runtime().spawn(async move {
            if let Err(e) = tracker.send_event(&payload).await {
                warn!(error = %e, url = %payload.url, "page view dropped");
            }
        });
    }

    pub(crate) fn track_outbound_click(&self, target: &ClickTarget) {
        let Some(destination) = outbound_destination(target, &self.page.url()) else {
            return;
        };
        debug!(href = %destination, "outbound link");

        let mut custom_data = Map::new();
        custom_data.insert("href".into(), json!(destination.as_str()));
        let payload = self.event_payload(EVENT_OUTBOUND_LINK, Some(custom_data), None);
        self.transport
            .beacon(paths::EVENT, Some(&payload), self.referrer().as_deref());
    }

    pub(crate) fn track_page_leave(&self) {
        let payload = self.event_payload(EVENT_PAGE_LEAVE, None, None);
        self.transport
            .beacon(paths::LEAVE, Some(&payload), self.referrer().as_deref());
    }
}
