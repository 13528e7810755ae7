//! Client configuration.

use crate::retry::RetryPolicy;
use std::time::Duration;

/// Default collector host.
pub const DEFAULT_HOST: &str = "https://hub.vemetric.com";

/// Shortest token the collector will accept.
pub const MIN_TOKEN_LENGTH: usize = 6;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait between checks while `update_user` waits for an identify to settle.
pub const DEFAULT_UPDATE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of re-checks before an `update_user` call is dropped.
pub const DEFAULT_UPDATE_MAX_RETRIES: u32 = 5;

/// Where the local identity (identifier and display name) is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityScope {
    /// Survives across browsing sessions.
    #[default]
    Durable,
    /// Lives only as long as the browsing session.
    Session,
}

/// Vemetric client configuration. Frozen once `init` accepts it.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) token: String,
    pub(crate) host: String,
    pub(crate) allow_cookies: bool,
    pub(crate) track_page_views: bool,
    pub(crate) track_outbound_links: bool,
    pub(crate) identity_scope: IdentityScope,
    pub(crate) mask_paths: Vec<String>,
    pub(crate) timeout: Duration,
    pub(crate) update_retry: RetryPolicy,
}

impl Config {
    /// Create a new builder with the given public token.
    pub fn builder(token: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(token)
    }

    /// Get the public token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the collector host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the visitor consented to cookies.
    pub fn allow_cookies(&self) -> bool {
        self.allow_cookies
    }

    /// Whether page views are tracked automatically.
    pub fn track_page_views(&self) -> bool {
        self.track_page_views
    }

    /// Whether outbound link clicks are tracked automatically.
    pub fn track_outbound_links(&self) -> bool {
        self.track_outbound_links
    }

    /// Get the identity persistence scope.
    pub fn identity_scope(&self) -> IdentityScope {
        self.identity_scope
    }

    /// Get the path masking patterns.
    pub fn mask_paths(&self) -> &[String] {
        &self.mask_paths
    }

    /// Get the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the retry policy used by `update_user`.
    pub fn update_retry(&self) -> RetryPolicy {
        self.update_retry
    }

    /// Whether the host differs from the default collector.
    pub(crate) fn is_custom_host(&self) -> bool {
        self.host != DEFAULT_HOST
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    token: String,
    host: Option<String>,
    allow_cookies: bool,
    track_page_views: bool,
    track_outbound_links: bool,
    identity_scope: IdentityScope,
    mask_paths: Vec<String>,
    timeout: Option<Duration>,
    update_retry: Option<RetryPolicy>,
}

impl ConfigBuilder {
    /// Create a new builder with the given public token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            host: None,
            allow_cookies: false,
            track_page_views: true,
            track_outbound_links: true,
            identity_scope: IdentityScope::default(),
            mask_paths: Vec::new(),
            timeout: None,
            update_retry: None,
        }
    }

    /// Set the collector host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the cookie consent flag.
    pub fn allow_cookies(mut self, allow: bool) -> Self {
        self.allow_cookies = allow;
        self
    }

    /// Toggle automatic page view tracking.
    pub fn track_page_views(mut self, enabled: bool) -> Self {
        self.track_page_views = enabled;
        self
    }

    /// Toggle automatic outbound link tracking.
    pub fn track_outbound_links(mut self, enabled: bool) -> Self {
        self.track_outbound_links = enabled;
        self
    }

    /// Choose where the local identity is persisted.
    pub fn identity_scope(mut self, scope: IdentityScope) -> Self {
        self.identity_scope = scope;
        self
    }

    /// Add a path pattern to mask, e.g. `/projects/*/settings`.
    pub fn mask_path(mut self, pattern: impl Into<String>) -> Self {
        self.mask_paths.push(pattern.into());
        self
    }

    /// Replace all path masking patterns.
    pub fn mask_paths<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask_paths = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry policy `update_user` uses while an identify is in flight.
    pub fn update_retry(mut self, policy: RetryPolicy) -> Self {
        self.update_retry = Some(policy);
        self
    }

    /// Validate and build the configuration.
    pub fn build_config(self) -> Result<Config, crate::Error> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(crate::Error::Config("token cannot be empty".into()));
        }
        if token.chars().count() < MIN_TOKEN_LENGTH {
            return Err(crate::Error::Config(format!(
                "token must be at least {} characters",
                MIN_TOKEN_LENGTH
            )));
        }

        let host = self
            .host
            .map(|h| h.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_HOST.into());
        match reqwest::Url::parse(&host) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(crate::Error::Config(format!(
                    "host must be an absolute http(s) URL, got {:?}",
                    host
                )))
            }
        }

        Ok(Config {
            token: token.to_string(),
            host,
            allow_cookies: self.allow_cookies,
            track_page_views: self.track_page_views,
            track_outbound_links: self.track_outbound_links,
            identity_scope: self.identity_scope,
            mask_paths: self.mask_paths,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            update_retry: self.update_retry.unwrap_or(RetryPolicy {
                interval: DEFAULT_UPDATE_RETRY_INTERVAL,
                max_retries: DEFAULT_UPDATE_MAX_RETRIES,
            }),
        })
    }
}
