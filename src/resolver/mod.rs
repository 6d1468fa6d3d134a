// Resolver module - embed page to stream manifest pipeline

pub mod classify;
pub mod config;
pub mod decrypt;
pub mod diagnostics;
pub mod errors;
pub mod http;
pub mod kdf;
pub mod key_cache;
pub mod models;
pub mod nonce;
pub mod orchestrator;
pub mod remote;
pub mod strategies;
pub mod traits;
pub mod utils;

pub use config::{ApiVersion, ExternalCommand, ResolverConfig};
pub use diagnostics::FailureStage;
pub use errors::{ErrorCategory, ResolveError};
pub use http::ReqwestFetcher;
pub use key_cache::{KeyCache, RegistryKeySource};
pub use models::{
    EmbedRequest, Marker, NormalizedResult, ResolveMode, Source, SourcesResponse, Track,
    TrackPolicy,
};
pub use orchestrator::EmbedResolver;
pub use traits::{HttpFetcher, KeySource, RequestHeaders};
