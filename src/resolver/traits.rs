// Outbound seams of the pipeline

use async_trait::async_trait;

use super::errors::ResolveError;

/// Header set sent on provider requests
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestHeaders {
    pub pairs: Vec<(String, String)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.pairs.push((name.to_string(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Trait for the web request layer.
///
/// Each call is a single attempt bounded by the implementation's per-hop
/// timeout.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url` and return the response body as text
    async fn get_text(&self, url: &str, headers: &RequestHeaders) -> Result<String, ResolveError>;
}

/// Trait for anything that can produce the current decryption password
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Name of the source (for logging)
    fn name(&self) -> &'static str;

    async fn fetch_key(&self) -> Result<String, ResolveError>;
}
