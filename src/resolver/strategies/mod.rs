// Resolution strategies
//
// Provider generations differ in endpoint version and in how encrypted
// sources are opened. Instead of one code path per generation, the resolver
// holds one `Strategy` and dispatches on it once per request:
// - ProviderApi: nonce-gated getSources call, with a per-payload decrypt path
//   (local envelope decryption or the remote decoder)
// - External: the whole resolution is delegated to an out-of-process command

mod external;
mod provider;

pub use external::ExternalStrategy;
pub use provider::ProviderApiStrategy;

use std::fmt;

use super::config::ApiVersion;
use super::decrypt::looks_like_envelope;

/// How an encrypted `sources` string gets opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptPath {
    /// AES envelope decrypted in-process with the registry key
    Local,
    /// Remote decoder with nonce + registry key
    Remote,
}

impl DecryptPath {
    /// Pick the path for one payload.
    ///
    /// `Auto` probes the payload: a base64 `Salted__` envelope is opened
    /// locally, anything else goes to the remote decoder.
    pub fn select(version: ApiVersion, envelope: &str) -> Self {
        match version {
            ApiVersion::V2 => Self::Local,
            ApiVersion::V3 => Self::Remote,
            ApiVersion::Auto => {
                if looks_like_envelope(envelope) {
                    Self::Local
                } else {
                    Self::Remote
                }
            }
        }
    }
}

impl fmt::Display for DecryptPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "decrypt-local"),
            Self::Remote => write!(f, "decrypt-remote"),
        }
    }
}

/// Strategy the resolver runs for every request
pub enum Strategy {
    ProviderApi(ProviderApiStrategy),
    External(ExternalStrategy),
}

impl Strategy {
    /// Name of the strategy (for logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProviderApi(api) => api.name(),
            Self::External(_) => "external-command",
        }
    }
}
