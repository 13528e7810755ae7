//! Vemetric analytics SDK for Rust hosts.
//!
//! Observes page views, navigation and outbound link clicks on a host
//! page, ties them to a durable visitor identity and relays them to the
//! Vemetric collector over HTTP.
//!
//! The host supplies a [`Page`] (location, referrer and page signals) and
//! [`Stores`] (durable and session key/value storage). [`HeadlessPage`]
//! and [`MemoryStorage`] cover hosts without a document.
//!
//! # Example
//!
//! ```rust,ignore
//! use vemetric::{Config, HeadlessPage, Stores, Vemetric};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vemetric::Error> {
//!     let page = HeadlessPage::new("https://example.com/");
//!     let client = Vemetric::new(page.clone(), Stores::in_memory());
//!     client.init(Config::builder("pk_xxxxxx").allow_cookies(true))?;
//!
//!     // reported once as $$pageView
//!     page.push_state("https://example.com/pricing");
//!
//!     client.track_event("signup")
//!         .data("plan", "pro")
//!         .send()
//!         .await?;
//!
//!     client.shutdown();
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod context;
mod error;
mod identity;
mod instrumentation;
mod mask;
mod page;
mod retry;
mod storage;
mod transport;
pub mod types;

pub use client::{IdentifyOutcome, SendableEvent, SendableIdentify, Vemetric};
pub use config::{
    Config, ConfigBuilder, IdentityScope, DEFAULT_HOST, DEFAULT_TIMEOUT,
    DEFAULT_UPDATE_MAX_RETRIES, DEFAULT_UPDATE_RETRY_INTERVAL, MIN_TOKEN_LENGTH,
};
pub use context::ContextProvider;
pub use error::Error;
pub use identity::{Identity, IdentityState};
pub use mask::mask_url;
pub use page::{ClickTarget, HeadlessPage, Navigation, Page, PageListener, Subscription};
pub use retry::{retry, RetryPolicy};
pub use storage::{
    MemoryStorage, Storage, Stores, KEY_CONTEXT_ID, KEY_DISPLAY_NAME, KEY_IDENTIFIER,
};
pub use transport::{
    effective_referrer, HttpTransport, HEADER_ALLOW_COOKIES, HEADER_HOST, HEADER_REFERRER,
    HEADER_TOKEN,
};
pub use types::{EventPayload, IdentifyPayload, UpdateUserPayload, UserData};
