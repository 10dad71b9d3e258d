//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use civicbridge_config::{AppConfig, ProviderConfig, ProviderKind, RateLimitConfig, RetryConfig};

/// Fluent builder for [`AppConfig`] in tests.
///
/// Defaults to an in-memory history backend and no retry backoff so tests
/// never touch the filesystem or sleep unless asked to.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .primary("OpenAI")
///     .provider_key("OpenAI", "sk-test")
///     .max_attempts(2)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    /// Start from defaults with memory history and no backoff.
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.history.backend = "memory".to_string();
        config.retry.backoff_ms = 0;
        Self { config }
    }

    /// Name the provider tried first.
    pub fn primary(mut self, name: &str) -> Self {
        self.config.ai.primary_provider = name.to_string();
        self
    }

    /// Record queries no provider answered.
    pub fn record_failures(mut self, enabled: bool) -> Self {
        self.config.ai.record_failures = enabled;
        self
    }

    /// Bound provider attempts per query (0 disables the deadline).
    pub fn route_timeout_ms(mut self, ms: u64) -> Self {
        self.config.ai.route_timeout_ms = ms;
        self
    }

    /// Set the global token bucket.
    pub fn rate_limit(mut self, capacity: u32, refill_per_minute: u32) -> Self {
        self.config.rate_limit = RateLimitConfig {
            capacity,
            refill_per_minute,
        };
        self
    }

    /// Set the global attempt budget.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    /// Set the global backoff between attempts.
    pub fn backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.backoff_ms = ms;
        self
    }

    /// Replace the provider registry.
    pub fn providers(mut self, providers: Vec<ProviderConfig>) -> Self {
        self.config.providers = providers;
        self
    }

    /// Append one provider entry.
    pub fn provider(mut self, name: &str, kind: ProviderKind) -> Self {
        self.config.providers.push(ProviderConfig::new(name, kind));
        self
    }

    /// Set an inline API key on an existing provider entry.
    pub fn provider_key(mut self, name: &str, key: &str) -> Self {
        if let Some(provider) = self.config.providers.iter_mut().find(|p| p.name == name) {
            provider.api_key = Some(key.to_string());
        }
        self
    }

    /// Point an existing provider entry at a different endpoint.
    pub fn provider_base_url(mut self, name: &str, url: &str) -> Self {
        if let Some(provider) = self.config.providers.iter_mut().find(|p| p.name == name) {
            provider.base_url = Some(url.to_string());
        }
        self
    }

    /// Override the retry policy of one provider entry.
    pub fn provider_retry(mut self, name: &str, max_attempts: u32, backoff_ms: u64) -> Self {
        if let Some(provider) = self.config.providers.iter_mut().find(|p| p.name == name) {
            provider.retry = Some(RetryConfig {
                max_attempts,
                backoff_ms,
            });
        }
        self
    }

    /// Switch history to a JSON-lines file at `path`.
    pub fn history_jsonl(mut self, path: &str) -> Self {
        self.config.history.backend = "jsonl".to_string();
        self.config.history.path = path.to_string();
        self
    }

    /// Finish and return the config.
    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
