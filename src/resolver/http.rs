// reqwest-backed web request layer

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

use super::config::ResolverConfig;
use super::errors::ResolveError;
use super::traits::{HttpFetcher, RequestHeaders};

/// Header set the provider expects from its own player.
///
/// Referer is the provider origin unless `forward_referrer` is enabled and
/// the caller supplied a non-empty referrer.
pub fn provider_headers(config: &ResolverConfig, referrer: Option<&str>) -> RequestHeaders {
    let referer = referrer
        .filter(|r| config.forward_referrer && !r.trim().is_empty())
        .unwrap_or(config.provider_url.as_str());

    RequestHeaders::new()
        .with("Accept", "*/*")
        .with("X-Requested-With", "XMLHttpRequest")
        .with("Referer", referer)
        .with("User-Agent", config.user_agent.clone())
}

/// HTTP fetcher over a shared reqwest client
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client with the configured per-hop timeout and optional proxy
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds as u64))
            .user_agent(config.user_agent.clone());

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ResolveError::InvalidUrl(format!("proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    fn header_map(headers: &RequestHeaders) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &headers.pairs {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid request header"),
            }
        }
        map
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get_text(&self, url: &str, headers: &RequestHeaders) -> Result<String, ResolveError> {
        debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .headers(Self::header_map(headers))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}
