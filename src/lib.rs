pub mod logging;
pub mod resolver;

pub use logging::{init_logging, LoggingConfig};
pub use resolver::{
    EmbedRequest, EmbedResolver, ErrorCategory, FailureStage, NormalizedResult, ResolveError,
    ResolveMode, ResolverConfig, Source, Track,
};

/// Resolve one embed URL with configuration taken from the environment.
///
/// Runs in the configured mode (strict unless `EMBED_RESOLVER_MODE` says
/// otherwise). Building a resolver per call drops the key cache; long-lived
/// callers should keep an `EmbedResolver` instead.
pub async fn resolve(embed_url: &str, referrer: &str) -> Result<NormalizedResult, ResolveError> {
    let resolver = EmbedResolver::new(ResolverConfig::from_env())?;
    resolver.resolve(embed_url, referrer).await
}
