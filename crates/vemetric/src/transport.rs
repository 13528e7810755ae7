//! HTTP transport for sending payloads to the collector.

use crate::config::Config;
use crate::Error;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Header carrying the public token.
pub const HEADER_TOKEN: &str = "Token";

/// Header carrying the cookie consent flag.
pub const HEADER_ALLOW_COOKIES: &str = "Allow-Cookies";

/// Header carrying the configured host when it is not the default collector.
pub const HEADER_HOST: &str = "V-Host";

/// Header carrying the document referrer.
pub const HEADER_REFERRER: &str = "V-Referrer";

/// The referrer to report, dropping self-referrals from the current page.
pub fn effective_referrer(referrer: Option<String>, current_url: &str) -> Option<String> {
    referrer.filter(|r| !r.is_empty() && r != current_url)
}

/// HTTP transport for sending payloads to the Vemetric collector.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
    base_headers: Vec<(&'static str, String)>,
    runtime: Handle,
}

impl HttpTransport {
    /// Create a new HTTP transport bound to the current Tokio runtime.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .cookie_store(true)
            .build()?;

        let mut base_headers = vec![
            (HEADER_TOKEN, config.token().to_string()),
            (HEADER_ALLOW_COOKIES, config.allow_cookies().to_string()),
        ];
        if config.is_custom_host() {
            base_headers.push((HEADER_HOST, config.host().to_string()));
        }

        Ok(Self {
            client,
            host: config.host().to_string(),
            base_headers,
            runtime,
        })
    }

    /// Runtime that background sends are spawned on.
    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn request(
        &self,
        path: &str,
        body: Option<Vec<u8>>,
        referrer: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json");
        for (name, value) in &self.base_headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(referrer) = referrer {
            request = request.header(HEADER_REFERRER, referrer);
        }
        match body {
            Some(body) => request.body(body),
            None => request,
        }
    }

    /// Send a payload and wait for the collector to accept it.
    pub async fn confirm<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: Option<&T>,
        referrer: Option<&str>,
    ) -> Result<(), Error> {
        let body = payload.map(serde_json::to_vec).transpose()?;

        debug!(path, "sending request");

        let response = self
            .request(path, body, referrer)
            .send()
            .await
            .map_err(|e| {
                warn!(path, error = %e, "request failed without response");
                Error::Transport {
                    status: None,
                    status_text: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(path, status = %status, "collector rejected request");
            return Err(Error::Transport {
                status: Some(status.as_u16()),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        debug!(path, status = %status, "request accepted");
        Ok(())
    }

    /// Hand a payload off without waiting for, or reporting, the outcome.
    ///
    /// Returns as soon as the request is spawned; safe during page teardown.
    pub fn beacon<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: Option<&T>,
        referrer: Option<&str>,
    ) {
        let body = match payload.map(serde_json::to_vec).transpose() {
            Ok(body) => body,
            Err(e) => {
                debug!(path, error = %e, "dropping beacon with unserializable payload");
                return;
            }
        };

        let request = self.request(path, body, referrer);
        let path = path.to_string();
        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) => {
                    debug!(path = %path, status = %response.status(), "beacon delivered")
                }
                Err(e) => debug!(path = %path, error = %e, "beacon lost"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[test]
    fn test_referrer_suppresses_self_referral() {
        let url = "https://x.test/a";
        assert_eq!(effective_referrer(Some(url.into()), url), None);
        assert_eq!(
            effective_referrer(Some("https://search.test/".into()), url),
            Some("https://search.test/".into())
        );
        assert_eq!(effective_referrer(Some(String::new()), url), None);
        assert_eq!(effective_referrer(None, url), None);
    }

    #[tokio::test]
    async fn test_default_host_headers() {
        let config = ConfigBuilder::new("abc123").build_config().unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(transport.url("/e"), "https://hub.vemetric.com/e");
        assert_eq!(
            transport.base_headers,
            vec![
                (HEADER_TOKEN, "abc123".to_string()),
                (HEADER_ALLOW_COOKIES, "false".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_custom_host_adds_host_header() {
        let config = ConfigBuilder::new("abc123")
            .host("https://proxy.example.com")
            .allow_cookies(true)
            .build_config()
            .unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(transport.url("/i"), "https://proxy.example.com/i");
        assert!(transport
            .base_headers
            .contains(&(HEADER_HOST, "https://proxy.example.com".to_string())));
        assert!(transport
            .base_headers
            .contains(&(HEADER_ALLOW_COOKIES, "true".to_string())));
    }

    #[test]
    fn test_requires_runtime() {
        let config = ConfigBuilder::new("abc123").build_config().unwrap();
        assert!(matches!(HttpTransport::new(&config), Err(Error::Runtime(_))));
    }
}
