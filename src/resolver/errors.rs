// Error types for the embed resolution pipeline

use thiserror::Error;

use super::diagnostics::FailureStage;

/// Coarse grouping a strict caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request or the provider's answer can never resolve as-is
    InputInvalid,
    /// A remote hop failed; trying again or another server may help
    UpstreamUnavailable,
    /// Key material or envelope did not produce a usable plaintext
    DecryptionFailed,
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Embed page carried neither nonce pattern
    #[error("Could not extract nonce from embed page")]
    NonceNotFound,

    /// Source API answered without a `sources` field
    #[error("No sources found in API response")]
    SourceFieldMissing,

    /// Key registry could not provide a password
    #[error("Could not fetch decryption key: {0}")]
    KeyUnavailable(String),

    /// Payload is not a base64 `Salted__` envelope
    #[error("Malformed cipher envelope: {0}")]
    EnvelopeMalformed(String),

    /// Block decryption, padding or UTF-8 recovery failed
    #[error("Decryption failed: {0}")]
    CipherFailure(String),

    #[error("JSON parse error: {0}")]
    JsonParseFailure(String),

    /// Remote decoder answered without a `file` field
    #[error("Remote decode failed: {0}")]
    RemoteDecodeFailure(String),

    #[error("Unexpected sources payload shape: {0}")]
    UnexpectedPayloadShape(String),

    /// Normalisation produced zero playable sources
    #[error("No playable sources after normalization")]
    NoSources,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Upstream returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Endpoint answered 2xx with a body that is not the expected JSON
    /// (challenge pages, maintenance HTML)
    #[error("Unreadable response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// Out-of-process decrypt collaborator failed to run or answer
    #[error("External decrypt command failed: {0}")]
    ExternalCommand(String),
}

impl ResolveError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NonceNotFound
            | Self::SourceFieldMissing
            | Self::UnexpectedPayloadShape(_)
            | Self::NoSources
            | Self::InvalidUrl(_) => ErrorCategory::InputInvalid,
            Self::KeyUnavailable(_)
            | Self::Network(_)
            | Self::Timeout(_)
            | Self::HttpStatus { .. }
            | Self::MalformedResponse { .. }
            | Self::RemoteDecodeFailure(_)
            | Self::ExternalCommand(_) => ErrorCategory::UpstreamUnavailable,
            Self::EnvelopeMalformed(_) | Self::CipherFailure(_) | Self::JsonParseFailure(_) => {
                ErrorCategory::DecryptionFailed
            }
        }
    }

    /// Terminal pipeline state this error ends in
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::NonceNotFound => FailureStage::NoNonce,
            Self::SourceFieldMissing => FailureStage::NoSourcesField,
            Self::KeyUnavailable(_) => FailureStage::NoKey,
            Self::EnvelopeMalformed(_)
            | Self::CipherFailure(_)
            | Self::JsonParseFailure(_)
            | Self::RemoteDecodeFailure(_)
            | Self::ExternalCommand(_) => FailureStage::DecryptFailed,
            Self::UnexpectedPayloadShape(_) | Self::NoSources => FailureStage::EmptyAfterNormalize,
            Self::InvalidUrl(_)
            | Self::Network(_)
            | Self::Timeout(_)
            | Self::HttpStatus { .. }
            | Self::MalformedResponse { .. } => FailureStage::Upstream,
        }
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.as_str().to_string())
            .unwrap_or_default();

        if err.is_timeout() {
            return Self::Timeout(url);
        }

        if let Some(status) = err.status() {
            return Self::HttpStatus {
                status: status.as_u16(),
                url,
            };
        }

        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParseFailure(err.to_string())
    }
}
