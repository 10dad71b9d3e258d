//! Provider registry configuration.
//!
//! Each `[[providers]]` entry describes one AI backend. The order of the
//! entries is the failover order used by the router; `ai.primary_provider`
//! only decides which entry is tried first.

use serde::{Deserialize, Serialize};

use crate::{RateLimitConfig, RetryConfig};

/// Which implementation backs a provider entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Google Gemini `generateContent` API.
    #[serde(rename = "gemini")]
    Gemini,
    /// OpenAI-compatible chat completions API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Local keyword classifier backed by the civic catalog.
    #[serde(rename = "rule-based")]
    RuleBased,
}

impl ProviderKind {
    /// Whether this kind talks to a remote service and needs a credential.
    pub fn is_remote(self) -> bool {
        !matches!(self, ProviderKind::RuleBased)
    }
}

/// A single `[[providers]]` entry.
///
/// ## TOML Example
///
/// ```toml
/// [[providers]]
/// name = "Gemini"
/// kind = "gemini"
/// api_key_env = "GEMINI_API_KEY"
/// model = "gemini-pro"
/// timeout_secs = 20
///
/// [providers.rate_limit]
/// capacity = 30
/// refill_per_minute = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name, also written into query history.
    pub name: String,

    /// Backend implementation.
    pub kind: ProviderKind,

    /// Inline credential. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable holding the credential.
    /// Defaults to `CIVICBRIDGE_<NAME>_API_KEY`.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model identifier; the backend default is used when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Endpoint override (for proxies and OpenAI-compatible servers).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides the global `[rate_limit]` section for this provider.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Overrides the global `[retry]` section for this provider.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ProviderConfig {
    /// Create an entry with defaults for everything but name and kind.
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            api_key: None,
            api_key_env: None,
            model: None,
            base_url: None,
            timeout_secs: default_request_timeout_secs(),
            rate_limit: None,
            retry: None,
        }
    }

    /// Name of the environment variable consulted for this provider's credential.
    pub fn credential_env_var(&self) -> String {
        self.api_key_env.clone().unwrap_or_else(|| {
            let slug: String = self
                .name
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect();
            format!("CIVICBRIDGE_{slug}_API_KEY")
        })
    }

    /// The configured credential, treating an empty string as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Rate limit for this provider, falling back to the global section.
    pub fn effective_rate_limit(&self, global: &RateLimitConfig) -> RateLimitConfig {
        self.rate_limit.clone().unwrap_or_else(|| global.clone())
    }

    /// Retry policy for this provider, falling back to the global section.
    pub fn effective_retry(&self, global: &RetryConfig) -> RetryConfig {
        self.retry.clone().unwrap_or_else(|| global.clone())
    }
}

/// The registry used when no `[[providers]]` entries are configured:
/// Gemini first, then OpenAI, with the rule-based classifier as last resort.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("Gemini", ProviderKind::Gemini),
        ProviderConfig::new("OpenAI", ProviderKind::OpenAi),
        ProviderConfig::new("RuleBased", ProviderKind::RuleBased),
    ]
}
