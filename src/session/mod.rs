use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE};
use reqwest::Client;
use std::time::Duration;

use crate::proxy::ProxyConfig;
use crate::RunError;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-run network context shared by the resolver and the fetcher.
///
/// Built once after the proxy is resolved; every request of the run goes
/// through the same client and therefore the same proxy identity. Dropping
/// the session releases its connection pool.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    proxy: ProxyConfig,
}

impl Session {
    pub fn new(proxy: ProxyConfig) -> Result<Self, RunError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        // Skips the EU cookie consent interstitial on the watch page
        headers.insert(COOKIE, HeaderValue::from_static("CONSENT=YES+cb"));

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT);

        if let Some(url) = proxy.url() {
            let reqwest_proxy = reqwest::Proxy::all(url).map_err(|e| {
                RunError::Session(format!(
                    "invalid proxy {}: {}",
                    proxy.masked().unwrap_or_default(),
                    e
                ))
            })?;
            builder = builder.proxy(reqwest_proxy);
        } else {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| RunError::Session(format!("could not build HTTP client: {}", e)))?;

        Ok(Self { client, proxy })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.proxy
    }

    pub fn uses_proxy(&self) -> bool {
        !self.proxy.is_direct()
    }
}
