// Resolver configuration
//
// Defaults point at the live provider and the public key registry. Every
// value can be overridden with a `with_*` builder or, for deployments, an
// `EMBED_RESOLVER_*` environment variable.

use std::fmt;
use std::str::FromStr;

use super::models::{ResolveMode, TrackPolicy};

pub const DEFAULT_PROVIDER_URL: &str = "https://megacloud.blog";
pub const DEFAULT_KEY_URL: &str =
    "https://raw.githubusercontent.com/yogesh-hacker/MegacloudKeys/refs/heads/main/keys.json";
pub const DEFAULT_KEY_FIELD: &str = "mega";
pub const DEFAULT_DECODE_URL: &str = "https://script.google.com/macros/s/AKfycbx-yHTwupis_JD0lNzoOnxYcEYeXmJZrg7JeMxYnEZnLBy5V0--UxEvP-y9txHyy1TX9Q/exec";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Mobile Safari/537.36";

/// Provider source API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    /// v2 endpoint, envelope decrypted locally with the registry key
    V2,
    /// v3 endpoint, envelope decrypted by the remote decoder
    #[default]
    V3,
    /// v3 endpoint, decrypt path picked from the payload shape
    Auto,
}

impl ApiVersion {
    /// Path segment of the getSources endpoint
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 | Self::Auto => "v3",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => write!(f, "v2"),
            Self::V3 => write!(f, "v3"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" | "2" => Ok(Self::V2),
            "v3" | "3" => Ok(Self::V3),
            "auto" => Ok(Self::Auto),
            other => Err(format!("Unknown API version: {}", other)),
        }
    }
}

impl FromStr for ResolveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "best-effort" | "best_effort" | "besteffort" => Ok(Self::BestEffort),
            other => Err(format!("Unknown resolve mode: {}", other)),
        }
    }
}

/// Out-of-process decrypt collaborator.
///
/// Invoked as `program [args..] <embed_url> <referrer>`; stdout must be a
/// JSON document in the normalized result shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Configuration for embed resolution
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Provider origin, used for the API URL and the fallback Referer
    pub provider_url: String,
    /// Source API generation
    pub api_version: ApiVersion,
    /// Public JSON document holding the current password
    pub key_url: String,
    /// Field of the key document that holds the password
    pub key_field: String,
    /// Remote decoder endpoint
    pub decode_url: String,
    pub user_agent: String,
    /// Timeout for each outbound hop, in seconds
    pub timeout_seconds: u32,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Send the caller's referrer instead of the provider origin as Referer
    pub forward_referrer: bool,
    pub mode: ResolveMode,
    pub track_policy: TrackPolicy,
    /// When set, resolution is delegated to this command entirely
    pub external_command: Option<ExternalCommand>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            api_version: ApiVersion::default(),
            key_url: DEFAULT_KEY_URL.to_string(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            decode_url: DEFAULT_DECODE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: 30,
            proxy: None,
            forward_referrer: false,
            mode: ResolveMode::default(),
            track_policy: TrackPolicy::default(),
            external_command: None,
        }
    }
}

impl ResolverConfig {
    /// Defaults with `EMBED_RESOLVER_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup (the process environment in production)
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("EMBED_RESOLVER_PROVIDER_URL") {
            self.provider_url = url;
        }
        if let Some(version) = var("EMBED_RESOLVER_API_VERSION").and_then(|v| v.parse().ok()) {
            self.api_version = version;
        }
        if let Some(url) = var("EMBED_RESOLVER_KEY_URL") {
            self.key_url = url;
        }
        if let Some(field) = var("EMBED_RESOLVER_KEY_FIELD") {
            self.key_field = field;
        }
        if let Some(url) = var("EMBED_RESOLVER_DECODE_URL") {
            self.decode_url = url;
        }
        if let Some(ua) = var("EMBED_RESOLVER_USER_AGENT") {
            self.user_agent = ua;
        }
        if let Some(secs) = var("EMBED_RESOLVER_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.timeout_seconds = secs;
        }
        if let Some(proxy) = var("EMBED_RESOLVER_PROXY") {
            self.proxy = Some(proxy);
        }
        if let Some(flag) = var("EMBED_RESOLVER_FORWARD_REFERRER") {
            self.forward_referrer = is_truthy(&flag);
        }
        if let Some(mode) = var("EMBED_RESOLVER_MODE").and_then(|v| v.parse().ok()) {
            self.mode = mode;
        }
        if let Some(flag) = var("EMBED_RESOLVER_CAPTIONS_ONLY") {
            if is_truthy(&flag) {
                self.track_policy = TrackPolicy::CaptionsOnly;
            }
        }
        if let Some(program) = var("EMBED_RESOLVER_EXTERNAL_COMMAND") {
            self.external_command = Some(ExternalCommand::new(program));
        }

        self
    }

    pub fn with_provider_url(mut self, url: impl Into<String>) -> Self {
        self.provider_url = url.into();
        self
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_key_url(mut self, url: impl Into<String>) -> Self {
        self.key_url = url.into();
        self
    }

    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    pub fn with_decode_url(mut self, url: impl Into<String>) -> Self {
        self.decode_url = url.into();
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_forward_referrer(mut self, forward: bool) -> Self {
        self.forward_referrer = forward;
        self
    }

    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_track_policy(mut self, policy: TrackPolicy) -> Self {
        self.track_policy = policy;
        self
    }

    pub fn with_external_command(mut self, command: Option<ExternalCommand>) -> Self {
        self.external_command = command;
        self
    }
}

fn is_truthy(flag: &str) -> bool {
    matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
