//! AI providers behind a unified [`Provider`] trait.
//!
//! Currently supported:
//!
//! - **Gemini**: Google `generateContent` API
//! - **OpenAI**: Chat Completions API (and compatible endpoints)
//! - **RuleBased**: keyword classifier answering from the catalog, no network
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐     ┌──────────────┐
//! │ FailoverRouter │────▶│   Provider   │  (trait)
//! └────────────────┘     └──────┬───────┘
//!                               │
//!              ┌────────────────┼────────────────┐
//!              ▼                ▼                ▼
//!     ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!     │    Gemini    │  │    OpenAI    │  │  RuleBased   │
//!     │ (remote API) │  │ (remote API) │  │  (catalog)   │
//!     └──────────────┘  └──────────────┘  └──────────────┘
//! ```
//!
//! A provider makes exactly one attempt per `process` call. Admission
//! control and retry belong to the router's per-provider slot.

pub mod error;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod rule_based;

use std::sync::Arc;

use civicbridge_config::{ProviderConfig, ProviderKind};

use crate::BoxFuture;
use crate::catalog::CivicCatalog;
use crate::context::ContextSnippet;
use crate::query::Query;

pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use rule_based::RuleBasedProvider;

/// Core trait for answer providers.
///
/// Implementations must be `Send + Sync`; the router shares them across
/// concurrent queries. Uses `BoxFuture` for object safety.
pub trait Provider: Send + Sync {
    /// Stable, unique display name (e.g. "Gemini", "RuleBased").
    fn name(&self) -> &str;

    /// Whether the provider can be tried right now (e.g. has a credential).
    fn enabled(&self) -> bool;

    /// Whether `process` reads the context. The router skips building it
    /// for providers that don't.
    fn uses_context(&self) -> bool {
        true
    }

    /// Make one attempt at answering `query`.
    fn process<'a>(
        &'a self,
        query: &'a Query,
        context: &'a ContextSnippet,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;

    /// Re-read settings (credentials) from a fresh config entry.
    fn reload(&self, _config: &ProviderConfig) {}
}

/// Create a provider from its config entry.
pub fn create_provider(config: &ProviderConfig, catalog: Arc<dyn CivicCatalog>) -> Arc<dyn Provider> {
    match config.kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)),
        ProviderKind::RuleBased => {
            Arc::new(RuleBasedProvider::new(catalog).with_name(&config.name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    fn catalog() -> Arc<dyn CivicCatalog> {
        Arc::new(InMemoryCatalog::default())
    }

    #[test]
    fn test_create_gemini_provider() {
        let mut config = ProviderConfig::new("Gemini", ProviderKind::Gemini);
        config.api_key = Some("test-key".to_string());
        let provider = create_provider(&config, catalog());
        assert_eq!(provider.name(), "Gemini");
        assert!(provider.enabled());
    }

    #[test]
    fn test_create_openai_provider_without_key() {
        let config = ProviderConfig::new("OpenAI", ProviderKind::OpenAi);
        let provider = create_provider(&config, catalog());
        assert_eq!(provider.name(), "OpenAI");
        assert!(!provider.enabled());
    }

    #[test]
    fn test_create_rule_based_provider_keeps_configured_name() {
        let config = ProviderConfig::new("Fallback", ProviderKind::RuleBased);
        let provider = create_provider(&config, catalog());
        assert_eq!(provider.name(), "Fallback");
        assert!(provider.enabled());
        assert!(!provider.uses_context());
    }
}
