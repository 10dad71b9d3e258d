#![deny(unsafe_code)]

//! Configuration loading, validation, and environment overrides for
//! CivicBridge Assist.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`AppConfig`] type as the central configuration structure, and the
//! [`providers`] module describing the AI backend registry.

/// AI backend registry configuration.
pub mod providers;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use providers::{ProviderConfig, ProviderKind, default_providers};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Query orchestration settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Default per-provider admission control.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Default per-provider retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Context assembly limits.
    #[serde(default)]
    pub context: ContextConfig,

    /// Query history sink.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Civic catalog seed data.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Provider registry, in failover order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            context: ContextConfig::default(),
            history: HistoryConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
            providers: default_providers(),
        }
    }
}

/// Query orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Name of the provider tried first.
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,

    /// Append a history record (with empty provider and response) when every
    /// provider fails. Off by default: history is success-only.
    #[serde(default)]
    pub record_failures: bool,

    /// Deadline for a whole `route` call in milliseconds (0 = no deadline).
    #[serde(default)]
    pub route_timeout_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            primary_provider: default_primary_provider(),
            record_failures: false,
            route_timeout_ms: 0,
        }
    }
}

fn default_primary_provider() -> String {
    "Gemini".to_string()
}

/// Token-bucket parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity (burst size). 0 disables admission control.
    #[serde(default = "default_rate_capacity")]
    pub capacity: u32,

    /// Tokens added per minute, accrued continuously.
    #[serde(default = "default_refill_per_minute")]
    pub refill_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_rate_capacity(),
            refill_per_minute: default_refill_per_minute(),
        }
    }
}

fn default_rate_capacity() -> u32 {
    10
}

fn default_refill_per_minute() -> u32 {
    10
}

/// Fixed-backoff retry parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

/// Context assembly limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum number of programs rendered into the context.
    #[serde(default = "default_max_programs")]
    pub max_programs: usize,

    /// Maximum number of facilities rendered into the context.
    #[serde(default = "default_max_facilities")]
    pub max_facilities: usize,

    /// Maximum characters per rendered field.
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_programs: default_max_programs(),
            max_facilities: default_max_facilities(),
            max_field_chars: default_max_field_chars(),
        }
    }
}

fn default_max_programs() -> usize {
    5
}

fn default_max_facilities() -> usize {
    5
}

fn default_max_field_chars() -> usize {
    200
}

/// Query history sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Backend: "memory" or "jsonl".
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// File path for the "jsonl" backend.
    #[serde(default = "default_history_path")]
    pub path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: default_history_path(),
        }
    }
}

fn default_history_backend() -> String {
    "jsonl".to_string()
}

fn default_history_path() -> String {
    "data/query_history.jsonl".to_string()
}

/// Civic catalog configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// TOML file with `[[programs]]` and `[[facilities]]` tables.
    #[serde(default)]
    pub seed_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Environment variable that overrides `ai.primary_provider`.
pub const PRIMARY_PROVIDER_ENV: &str = "CIVICBRIDGE_PRIMARY_PROVIDER";

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay credentials and the primary provider from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup (the process environment in
    /// production, a map in tests). An inline `api_key` wins over the
    /// environment.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(primary) = lookup(PRIMARY_PROVIDER_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(primary = %primary, "primary provider overridden from environment");
            self.ai.primary_provider = primary.trim().to_string();
        }

        for provider in &mut self.providers {
            if !provider.kind.is_remote() || provider.credential().is_some() {
                continue;
            }
            let var = provider.credential_env_var();
            if let Some(key) = lookup(&var).filter(|v| !v.trim().is_empty()) {
                debug!(provider = %provider.name, var = %var, "credential loaded from environment");
                provider.api_key = Some(key);
            }
        }
    }

    /// Look up a provider entry by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.primary_provider.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ai.primary_provider must not be empty".to_string(),
            ));
        }

        if self.providers.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[providers]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "providers[{i}].name must not be empty"
                )));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "providers[{i}].name {:?} is not unique",
                    provider.name
                )));
            }
            if provider.kind.is_remote() && provider.timeout_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "providers[{i}].timeout_secs must be non-zero"
                )));
            }
            if let Some(ref rate_limit) = provider.rate_limit {
                validate_rate_limit(rate_limit, &format!("providers[{i}].rate_limit"))?;
            }
            if let Some(ref retry) = provider.retry {
                validate_retry(retry, &format!("providers[{i}].retry"))?;
            }
        }

        if self.provider(&self.ai.primary_provider).is_none() {
            // Not fatal: the router skips an unknown primary and fails over.
            warn!(
                primary = %self.ai.primary_provider,
                "ai.primary_provider does not name a configured provider"
            );
        }

        validate_rate_limit(&self.rate_limit, "rate_limit")?;
        validate_retry(&self.retry, "retry")?;

        if self.context.max_field_chars < 4 {
            return Err(ConfigError::Validation(format!(
                "context.max_field_chars must be at least 4, got {}",
                self.context.max_field_chars
            )));
        }

        let valid_backends = ["memory", "jsonl"];
        if !valid_backends.contains(&self.history.backend.as_str()) {
            return Err(ConfigError::Validation(format!(
                "history.backend must be one of {:?}, got {:?}",
                valid_backends, self.history.backend
            )));
        }
        if self.history.backend == "jsonl" && self.history.path.is_empty() {
            return Err(ConfigError::Validation(
                "history.path must not be empty for the jsonl backend".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

fn validate_rate_limit(config: &RateLimitConfig, section: &str) -> Result<(), ConfigError> {
    if config.capacity > 0 && config.refill_per_minute == 0 {
        return Err(ConfigError::Validation(format!(
            "{section}.refill_per_minute must be non-zero when capacity is set"
        )));
    }
    Ok(())
}

fn validate_retry(config: &RetryConfig, section: &str) -> Result<(), ConfigError> {
    if config.max_attempts == 0 {
        return Err(ConfigError::Validation(format!(
            "{section}.max_attempts must be at least 1"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.ai.primary_provider, "Gemini");
        assert!(!config.ai.record_failures);
        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.refill_per_minute, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_ms, 2000);
        assert_eq!(config.context.max_programs, 5);
        assert_eq!(config.context.max_facilities, 5);
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.ai.primary_provider, "Gemini");
        assert_eq!(config.providers.len(), 3);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [ai]
            primary_provider = "OpenAI"
            record_failures = true
            route_timeout_ms = 15000

            [rate_limit]
            capacity = 5
            refill_per_minute = 20

            [retry]
            max_attempts = 2
            backoff_ms = 500

            [context]
            max_programs = 3
            max_facilities = 2
            max_field_chars = 80

            [history]
            backend = "memory"

            [logging]
            level = "debug"

            [[providers]]
            name = "OpenAI"
            kind = "openai"
            model = "gpt-4o-mini"
            base_url = "http://localhost:11434/v1/chat/completions"

            [providers.retry]
            max_attempts = 5
            backoff_ms = 100

            [[providers]]
            name = "RuleBased"
            kind = "rule-based"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.ai.primary_provider, "OpenAI");
        assert!(config.ai.record_failures);
        assert_eq!(config.ai.route_timeout_ms, 15000);
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.retry.backoff_ms, 500);
        assert_eq!(config.context.max_field_chars, 80);
        assert_eq!(config.history.backend, "memory");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::OpenAi);
        assert_eq!(
            config.providers[0].effective_retry(&config.retry).max_attempts,
            5
        );
        assert_eq!(config.providers[1].kind, ProviderKind::RuleBased);
        assert_eq!(
            config.providers[1].effective_retry(&config.retry).max_attempts,
            2
        );
    }

    #[test]
    fn test_validation_rejects_duplicate_provider_names() {
        let toml = r#"
            [[providers]]
            name = "Gemini"
            kind = "gemini"

            [[providers]]
            name = "Gemini"
            kind = "openai"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_kind() {
        let toml = r#"
            [[providers]]
            name = "Claude"
            kind = "anthropic"
        "#;
        assert!(matches!(AppConfig::parse(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let toml = r#"
            [retry]
            max_attempts = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_refill() {
        let toml = r#"
            [rate_limit]
            capacity = 10
            refill_per_minute = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_zero_capacity_disables_limit() {
        let toml = r#"
            [rate_limit]
            capacity = 0
            refill_per_minute = 0
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.rate_limit.capacity, 0);
    }

    #[test]
    fn test_validation_rejects_bad_history_backend() {
        let toml = r#"
            [history]
            backend = "mongodb"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "verbose"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_unknown_primary_is_not_fatal() {
        let toml = r#"
            [ai]
            primary_provider = "Bard"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert!(config.provider("Bard").is_none());
    }

    // ── Environment overlay ───────────────────────────────────────────

    #[test]
    fn test_apply_env_loads_credentials() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CIVICBRIDGE_GEMINI_API_KEY", "g-key"),
            ("CIVICBRIDGE_PRIMARY_PROVIDER", "OpenAI"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_with(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.ai.primary_provider, "OpenAI");
        assert_eq!(
            config.provider("Gemini").unwrap().credential(),
            Some("g-key")
        );
        assert_eq!(config.provider("OpenAI").unwrap().credential(), None);
    }

    #[test]
    fn test_inline_key_wins_over_env() {
        let toml = r#"
            [[providers]]
            name = "Gemini"
            kind = "gemini"
            api_key = "inline"
        "#;
        let mut config = AppConfig::parse(toml).unwrap();
        config.apply_env_with(|_| Some("from-env".to_string()));
        assert_eq!(
            config.provider("Gemini").unwrap().credential(),
            Some("inline")
        );
    }

    #[test]
    fn test_api_key_not_serialized() {
        let toml = r#"
            [[providers]]
            name = "Gemini"
            kind = "gemini"
            api_key = "super-secret"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("Gemini"));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("civicbridge.toml");
        tokio::fs::write(&path, b"[ai]\nprimary_provider = \"RuleBased\"\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.ai.primary_provider, "RuleBased");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = AppConfig::parse(include_str!("../../../civicbridge.toml")).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(
            config.catalog.seed_path.as_deref(),
            Some("demos/catalog.toml")
        );
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
