// Provider getSources strategy
//
// Building blocks for the nonce-gated flow: fetch the embed page, call the
// versioned source API, and open encrypted payloads on the selected path.

use std::sync::Arc;
use tracing::{debug, info};

use super::DecryptPath;
use crate::resolver::classify::sources_from_plaintext;
use crate::resolver::config::{ApiVersion, ResolverConfig};
use crate::resolver::decrypt::try_decrypt;
use crate::resolver::errors::ResolveError;
use crate::resolver::http::provider_headers;
use crate::resolver::key_cache::KeyCache;
use crate::resolver::models::{EmbedRequest, Source, SourcesResponse};
use crate::resolver::nonce::Nonce;
use crate::resolver::remote::RemoteDecoder;
use crate::resolver::traits::{HttpFetcher, RequestHeaders};
use crate::resolver::utils::url_with_params;

pub struct ProviderApiStrategy {
    fetcher: Arc<dyn HttpFetcher>,
    keys: Arc<KeyCache>,
    remote: RemoteDecoder,
    config: ResolverConfig,
}

impl ProviderApiStrategy {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        keys: Arc<KeyCache>,
        config: ResolverConfig,
    ) -> Self {
        let remote = RemoteDecoder::new(fetcher.clone(), config.decode_url.clone())
            .with_headers(RequestHeaders::new().with("User-Agent", config.user_agent.clone()));

        Self {
            fetcher,
            keys,
            remote,
            config,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.config.api_version {
            ApiVersion::V2 => "provider-api-v2",
            ApiVersion::V3 => "provider-api-v3",
            ApiVersion::Auto => "provider-api-auto",
        }
    }

    /// Header set for page and API requests
    pub fn headers(&self, request: &EmbedRequest) -> RequestHeaders {
        provider_headers(&self.config, request.referrer.as_deref())
    }

    /// getSources URL for an embed id and nonce
    pub fn source_api_url(&self, embed_id: &str, nonce: &Nonce) -> Result<String, ResolveError> {
        let base = format!(
            "{}/embed-2/{}/e-1/getSources",
            self.config.provider_url.trim_end_matches('/'),
            self.config.api_version.endpoint_segment()
        );
        url_with_params(&base, &[("id", embed_id), ("_k", nonce.as_str())])
    }

    pub async fn fetch_embed_page(
        &self,
        request: &EmbedRequest,
        headers: &RequestHeaders,
    ) -> Result<String, ResolveError> {
        self.fetcher.get_text(&request.embed_url, headers).await
    }

    /// Call the source API and parse its JSON body
    pub async fn fetch_sources(
        &self,
        api_url: &str,
        headers: &RequestHeaders,
    ) -> Result<SourcesResponse, ResolveError> {
        let body = self.fetcher.get_text(api_url, headers).await?;
        let response: SourcesResponse =
            serde_json::from_str(&body).map_err(|e| ResolveError::MalformedResponse {
                url: api_url.to_string(),
                reason: e.to_string(),
            })?;
        debug!(has_sources = response.sources.is_some(), "Source API answered");
        Ok(response)
    }

    /// Open an encrypted `sources` string on the path picked for it
    pub async fn open_encrypted(
        &self,
        envelope: &str,
        nonce: &Nonce,
    ) -> Result<Vec<Source>, ResolveError> {
        let key = self.keys.get_decryption_key().await?;
        let path = DecryptPath::select(self.config.api_version, envelope);
        info!(path = %path, "Decrypting sources");

        match path {
            DecryptPath::Local => {
                let plaintext = try_decrypt(envelope, &key)?;
                sources_from_plaintext(&plaintext)
            }
            DecryptPath::Remote => {
                let file = self.remote.remote_decrypt(envelope, nonce, &key).await?;
                Ok(vec![Source::manifest(file)])
            }
        }
    }
}
