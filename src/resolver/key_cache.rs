// Decryption key cache
//
// The provider's current password is published in a small public JSON
// document. It is fetched on first need and kept for the lifetime of the
// cache owner; a failed fetch leaves the cache empty so the next call retries.
// Concurrent first calls may both fetch; the last write wins.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::config::ResolverConfig;
use super::errors::ResolveError;
use super::traits::{HttpFetcher, KeySource, RequestHeaders};
use super::utils::redact;

/// Key source backed by the public key registry document
pub struct RegistryKeySource {
    fetcher: Arc<dyn HttpFetcher>,
    url: String,
    field: String,
    headers: RequestHeaders,
}

impl RegistryKeySource {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, url: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
            field: field.into(),
            headers: RequestHeaders::new(),
        }
    }

    pub fn from_config(fetcher: Arc<dyn HttpFetcher>, config: &ResolverConfig) -> Self {
        Self::new(fetcher, config.key_url.clone(), config.key_field.clone())
            .with_headers(RequestHeaders::new().with("User-Agent", config.user_agent.clone()))
    }

    pub fn with_headers(mut self, headers: RequestHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Pull the password field out of the registry document
    fn parse_document(&self, body: &str) -> Result<String, ResolveError> {
        let json: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| ResolveError::KeyUnavailable(format!("invalid key document: {}", e)))?;

        json[self.field.as_str()]
            .as_str()
            .filter(|key| !key.is_empty())
            .map(|key| key.to_string())
            .ok_or_else(|| {
                ResolveError::KeyUnavailable(format!("field '{}' missing from key document", self.field))
            })
    }
}

#[async_trait]
impl KeySource for RegistryKeySource {
    fn name(&self) -> &'static str {
        "key-registry"
    }

    async fn fetch_key(&self) -> Result<String, ResolveError> {
        let body = self
            .fetcher
            .get_text(&self.url, &self.headers)
            .await
            .map_err(|e| ResolveError::KeyUnavailable(e.to_string()))?;

        self.parse_document(&body)
    }
}

/// Lazily populated password cache, owned by the resolver
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    cached: RwLock<Option<String>>,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Cache that starts with a known password
    pub fn seeded(source: Arc<dyn KeySource>, key: impl Into<String>) -> Self {
        Self {
            source,
            cached: RwLock::new(Some(key.into())),
        }
    }

    pub async fn is_cached(&self) -> bool {
        self.cached.read().await.is_some()
    }

    /// Return the cached password, fetching it once if absent
    pub async fn get_decryption_key(&self) -> Result<String, ResolveError> {
        if let Some(key) = self.cached.read().await.as_ref() {
            return Ok(key.clone());
        }

        debug!(source = self.source.name(), "Decryption key not cached, fetching");

        match self.source.fetch_key().await {
            Ok(key) => {
                info!(key = %redact(&key), "Decryption key fetched");
                *self.cached.write().await = Some(key.clone());
                Ok(key)
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Failed to fetch decryption key");
                Err(match e {
                    ResolveError::KeyUnavailable(_) => e,
                    other => ResolveError::KeyUnavailable(other.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fetcher that replays queued responses and counts calls
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<String, ResolveError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<String, ResolveError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpFetcher for ScriptedFetcher {
        async fn get_text(&self, _url: &str, _headers: &RequestHeaders) -> Result<String, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ResolveError::Network("no response queued".to_string())))
        }
    }

    fn cache_over(fetcher: Arc<ScriptedFetcher>) -> KeyCache {
        let source = RegistryKeySource::new(fetcher, "https://keys.test/keys.json", "mega");
        KeyCache::new(Arc::new(source))
    }

    #[tokio::test]
    async fn test_fetches_once_then_serves_cache() {
        let fetcher = ScriptedFetcher::new(vec![Ok(r#"{"mega":"k1","rabbit":"k2"}"#.to_string())]);
        let cache = cache_over(fetcher.clone());

        assert_eq!(cache.get_decryption_key().await.unwrap(), "k1");
        assert_eq!(cache.get_decryption_key().await.unwrap(), "k1");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_cached().await);
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_cache() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(ResolveError::Timeout("https://keys.test/keys.json".to_string())),
            Ok(r#"{"mega":"k1"}"#.to_string()),
        ]);
        let cache = cache_over(fetcher.clone());

        assert!(matches!(
            cache.get_decryption_key().await,
            Err(ResolveError::KeyUnavailable(_))
        ));
        assert!(!cache.is_cached().await);

        assert_eq!(cache.get_decryption_key().await.unwrap(), "k1");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_field_is_unavailable() {
        let fetcher = ScriptedFetcher::new(vec![Ok(r#"{"other":"k1"}"#.to_string())]);
        let cache = cache_over(fetcher);

        assert!(matches!(
            cache.get_decryption_key().await,
            Err(ResolveError::KeyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_document_is_unavailable() {
        let fetcher = ScriptedFetcher::new(vec![Ok("<html>rate limited</html>".to_string())]);
        let cache = cache_over(fetcher);

        assert!(matches!(
            cache.get_decryption_key().await,
            Err(ResolveError::KeyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_seeded_cache_skips_network() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let source = RegistryKeySource::new(fetcher.clone(), "https://keys.test/keys.json", "mega");
        let cache = KeyCache::seeded(Arc::new(source), "preset");

        assert_eq!(cache.get_decryption_key().await.unwrap(), "preset");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    /// Key source that yields before answering, so first calls overlap
    struct SlowKeySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeySource for SlowKeySource {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn fetch_key(&self) -> Result<String, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok("k-race".to_string())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access() {
        let source = Arc::new(SlowKeySource {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(KeyCache::new(source.clone()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.spawn(async move { cache.get_decryption_key().await });
        }

        let mut answered = 0;
        while let Some(joined) = tasks.join_next().await {
            assert_eq!(joined.unwrap().unwrap(), "k-race");
            answered += 1;
        }

        assert_eq!(answered, 8);
        assert!(cache.is_cached().await);
        assert!(source.calls.load(Ordering::SeqCst) >= 1);

        // Settled cache serves later calls without another fetch
        let settled = source.calls.load(Ordering::SeqCst);
        assert_eq!(cache.get_decryption_key().await.unwrap(), "k-race");
        assert_eq!(source.calls.load(Ordering::SeqCst), settled);
    }
}
