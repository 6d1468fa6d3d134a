// Failure diagnostics - terminal states of the resolution pipeline
//
// Every failed extraction ends in exactly one of these states. Strict callers
// use them (together with `ErrorCategory`) to decide whether to retry later,
// switch to another server, or surface a message to the user.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal failure states of one extraction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
    /// Embed page had no recognizable nonce
    NoNonce,

    /// Source API response lacked a `sources` field
    NoSourcesField,

    /// Key registry unreachable or missing the key field
    NoKey,

    /// Local or remote decryption did not yield a usable payload
    DecryptFailed,

    /// Payload classified fine but produced no playable source
    EmptyAfterNormalize,

    /// Transport failure on one of the outbound hops
    Upstream,
}

impl FailureStage {
    /// Whether a later attempt can plausibly succeed without code changes
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoKey | Self::Upstream)
    }

    /// Whether trying another server for the same episode might help
    pub fn other_server_might_help(&self) -> bool {
        matches!(
            self,
            Self::NoNonce | Self::NoSourcesField | Self::DecryptFailed | Self::EmptyAfterNormalize
        )
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoNonce => "Embed page did not contain a nonce",
            Self::NoSourcesField => "Source API returned no sources field",
            Self::NoKey => "Decryption key unavailable",
            Self::DecryptFailed => "Sources could not be decrypted",
            Self::EmptyAfterNormalize => "No playable sources in response",
            Self::Upstream => "Upstream request failed",
        }
    }

    /// Suggested next step for the caller
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NoNonce => {
                "The provider may have changed its page markup.\n\
                 Try another server, or update the nonce patterns."
            }
            Self::NoSourcesField => {
                "The episode may be unavailable on this server.\n\
                 Try another server."
            }
            Self::NoKey => {
                "The key registry is unreachable.\n\
                 Try again later."
            }
            Self::DecryptFailed => {
                "The provider may have rotated its key or scheme.\n\
                 A cached key is kept until restart; restart the process after the registry updates."
            }
            Self::EmptyAfterNormalize => "No source is available on this server. Try another server.",
            Self::Upstream => {
                "Check network connectivity or proxy settings.\n\
                 Try again later."
            }
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoNonce => "no-nonce",
            Self::NoSourcesField => "no-sources-field",
            Self::NoKey => "no-key",
            Self::DecryptFailed => "decrypt-failed",
            Self::EmptyAfterNormalize => "empty-after-normalize",
            Self::Upstream => "upstream",
        };
        write!(f, "{}", name)
    }
}
