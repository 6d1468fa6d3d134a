// Pipeline orchestrator with strict and best-effort operation modes
//
// START -> fetch-html -> extract-nonce -> call-source-api -> classify
//       -> {direct | decrypt-local | decrypt-remote} -> normalize -> DONE
//
// Any step may end the attempt in one of the `FailureStage` states. Strict
// callers get the error; best-effort callers get an empty result. Nothing is
// retried here.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::classify::{classify, map_entries, normalize, normalize_unencrypted, SourcePayload};
use super::config::ResolverConfig;
use super::errors::ResolveError;
use super::http::ReqwestFetcher;
use super::key_cache::{KeyCache, RegistryKeySource};
use super::models::{
    EmbedRequest, NormalizedResult, ResolveMode, Source, SourcesResponse, TrackPolicy,
};
use super::nonce::{extract_nonce, Nonce};
use super::strategies::{ExternalStrategy, ProviderApiStrategy, Strategy};
use super::traits::HttpFetcher;
use super::utils::{embed_id, redact};

/// Resolves embed pages into normalized sources
pub struct EmbedResolver {
    strategy: Strategy,
    mode: ResolveMode,
    track_policy: TrackPolicy,
}

impl EmbedResolver {
    /// Resolver over a reqwest client and the configured key registry
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        let fetcher: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Resolver over any web request layer; the key cache reads the registry through it
    pub fn with_fetcher(config: ResolverConfig, fetcher: Arc<dyn HttpFetcher>) -> Self {
        let source = RegistryKeySource::from_config(fetcher.clone(), &config);
        let keys = Arc::new(KeyCache::new(Arc::new(source)));
        Self::with_components(config, fetcher, keys)
    }

    /// Resolver with an explicitly owned key cache (shared, pre-seeded or mocked)
    pub fn with_components(
        config: ResolverConfig,
        fetcher: Arc<dyn HttpFetcher>,
        keys: Arc<KeyCache>,
    ) -> Self {
        let mode = config.mode;
        let track_policy = config.track_policy;

        let strategy = match config.external_command.clone() {
            Some(command) => Strategy::External(ExternalStrategy::new(
                command,
                config.timeout_seconds,
                track_policy,
            )),
            None => Strategy::ProviderApi(ProviderApiStrategy::new(fetcher, keys, config)),
        };

        Self {
            strategy,
            mode,
            track_policy,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// Resolve in the configured operation mode.
    ///
    /// In best-effort mode this never returns `Err`.
    pub async fn resolve(&self, embed_url: &str, referrer: &str) -> Result<NormalizedResult, ResolveError> {
        let request = EmbedRequest::new(embed_url).with_referrer(referrer);
        self.resolve_request(&request, self.mode).await
    }

    pub async fn resolve_request(
        &self,
        request: &EmbedRequest,
        mode: ResolveMode,
    ) -> Result<NormalizedResult, ResolveError> {
        match mode {
            ResolveMode::Strict => self.resolve_strict(request).await,
            ResolveMode::BestEffort => Ok(self.resolve_best_effort(request).await),
        }
    }

    /// Resolve, propagating every terminal failure as a structured error
    pub async fn resolve_strict(&self, request: &EmbedRequest) -> Result<NormalizedResult, ResolveError> {
        let result = match &self.strategy {
            Strategy::ProviderApi(api) => self.run_provider(api, request).await?,
            Strategy::External(external) => external.resolve(request).await?,
        };

        if !result.has_sources() {
            return Err(ResolveError::NoSources);
        }

        Ok(result)
    }

    /// Resolve, degrading every terminal failure to an empty result
    pub async fn resolve_best_effort(&self, request: &EmbedRequest) -> NormalizedResult {
        match self.resolve_strict(request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    embed_url = %request.embed_url,
                    stage = %e.stage(),
                    error = %e,
                    "Extraction failed, returning empty result"
                );
                NormalizedResult::empty()
            }
        }
    }

    /// Classify and normalize one source API response; never fails.
    ///
    /// Encrypted payloads are opened with the resolver's key cache when the
    /// strategy supports it.
    pub async fn classify_and_normalize(&self, response: &SourcesResponse, nonce: &Nonce) -> NormalizedResult {
        let api = match &self.strategy {
            Strategy::ProviderApi(api) => api,
            Strategy::External(_) => return normalize_unencrypted(response, self.track_policy),
        };

        match self.resolve_sources(api, response, nonce).await {
            Ok(sources) => normalize(response, sources, self.track_policy),
            Err(e) => {
                warn!(stage = %e.stage(), error = %e, "Could not resolve sources");
                NormalizedResult::empty()
            }
        }
    }

    async fn run_provider(
        &self,
        api: &ProviderApiStrategy,
        request: &EmbedRequest,
    ) -> Result<NormalizedResult, ResolveError> {
        let id = embed_id(&request.embed_url)?;
        let headers = api.headers(request);
        info!(embed_id = %id, strategy = api.name(), "Resolving embed");

        let html = api.fetch_embed_page(request, &headers).await?;
        let nonce = extract_nonce(&html).ok_or(ResolveError::NonceNotFound)?;
        debug!(nonce = %redact(nonce.as_str()), "Nonce extracted");

        let api_url = api.source_api_url(&id, &nonce)?;
        let response = api.fetch_sources(&api_url, &headers).await?;

        let sources = self.resolve_sources(api, &response, &nonce).await?;
        let result = normalize(&response, sources, self.track_policy);

        info!(
            embed_id = %id,
            sources = result.sources.len(),
            tracks = result.tracks.len(),
            "Embed resolved"
        );
        Ok(result)
    }

    async fn resolve_sources(
        &self,
        api: &ProviderApiStrategy,
        response: &SourcesResponse,
        nonce: &Nonce,
    ) -> Result<Vec<Source>, ResolveError> {
        let value = response
            .sources
            .as_ref()
            .filter(|v| !v.is_null() && v.as_str() != Some(""))
            .ok_or(ResolveError::SourceFieldMissing)?;

        let payload = classify(value);
        debug!(kind = payload.kind(), "Sources classified");

        match payload {
            SourcePayload::Manifest(url) => Ok(vec![Source::manifest(url)]),
            SourcePayload::Entries(entries) => Ok(map_entries(&entries)),
            SourcePayload::Encrypted(envelope) => api.open_encrypted(&envelope, nonce).await,
            SourcePayload::Unexpected(kind) => Err(ResolveError::UnexpectedPayloadShape(kind.to_string())),
        }
    }
}
