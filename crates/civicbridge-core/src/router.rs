//! Ordered failover across providers.
//!
//! The router owns a fixed registry of [`ProviderSlot`]s. For each query it
//! tries the configured primary first, then every other slot in
//! configuration order, stopping at the first answer. Each provider is tried
//! at most once per query:
//!
//! ```text
//! SelectPrimary ─▶ TryPrimary ─┬─▶ Success ─▶ record ─▶ answer
//!                              └─▶ TryNext ─▶ … ─▶ AllExhausted
//! ```
//!
//! A disabled provider, a rate-limiter rejection, and an exhausted retry
//! budget all count as that provider failing. Provider errors are logged and
//! never surface to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use civicbridge_config::AppConfig;

use crate::catalog::CivicCatalog;
use crate::context::{ContextBuilder, ContextSnippet};
use crate::history::{HistoryRecorder, QueryRecord};
use crate::provider::{Provider, ProviderError, create_provider};
use crate::query::Query;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

/// Router-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("all providers exhausted")]
    AllProvidersExhausted,

    #[error("routing deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// A provider with its own admission control and retry policy.
pub struct ProviderSlot {
    pub provider: Arc<dyn Provider>,
    pub limiter: RateLimiter,
    pub retry: RetryPolicy,
}

impl ProviderSlot {
    /// Bundle a provider with its limiter and retry policy.
    pub fn new(provider: Arc<dyn Provider>, limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self {
            provider,
            limiter,
            retry,
        }
    }

    /// The provider's name.
    pub fn name(&self) -> &str {
        self.provider.name()
    }

    /// One attempt sequence: admission, then `process` under the retry policy.
    async fn attempt(&self, query: &Query, context: &ContextSnippet) -> Result<String, ProviderError> {
        if !self.limiter.try_acquire() {
            return Err(ProviderError::AdmissionRejected(self.name().to_string()));
        }
        let provider = &self.provider;
        self.retry
            .execute(|| provider.process(query, context))
            .await
    }
}

/// Routes queries through the provider registry.
pub struct FailoverRouter {
    slots: Vec<ProviderSlot>,
    primary: String,
    context: ContextBuilder,
    history: Arc<dyn HistoryRecorder>,
    record_failures: bool,
    route_timeout: Option<Duration>,
}

impl FailoverRouter {
    /// Create a router over `slots`, tried with `primary` first.
    pub fn new(
        slots: Vec<ProviderSlot>,
        primary: impl Into<String>,
        context: ContextBuilder,
        history: Arc<dyn HistoryRecorder>,
    ) -> Self {
        let primary = primary.into();
        if !slots.iter().any(|s| s.name() == primary) {
            warn!(primary = %primary, "primary provider not in registry, using configuration order");
        }
        Self {
            slots,
            primary,
            context,
            history,
            record_failures: false,
            route_timeout: None,
        }
    }

    /// Also record queries no provider could answer.
    pub fn with_record_failures(mut self, record_failures: bool) -> Self {
        self.record_failures = record_failures;
        self
    }

    /// Bound the total time spent in provider attempts for one query.
    pub fn with_route_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.route_timeout = timeout;
        self
    }

    /// Build the registry, limiters, and retry policies from config.
    pub fn from_config(
        config: &AppConfig,
        catalog: Arc<dyn CivicCatalog>,
        history: Arc<dyn HistoryRecorder>,
    ) -> Self {
        let slots = config
            .providers
            .iter()
            .map(|pc| {
                let limits = pc.effective_rate_limit(&config.rate_limit);
                let retry = pc.effective_retry(&config.retry);
                debug!(
                    provider = %pc.name,
                    capacity = limits.capacity,
                    max_attempts = retry.max_attempts,
                    "provider registered"
                );
                ProviderSlot::new(
                    create_provider(pc, Arc::clone(&catalog)),
                    RateLimiter::from_config(&limits),
                    RetryPolicy::from_config(&retry),
                )
            })
            .collect();

        let route_timeout = (config.ai.route_timeout_ms > 0)
            .then(|| Duration::from_millis(config.ai.route_timeout_ms));

        Self::new(
            slots,
            config.ai.primary_provider.clone(),
            ContextBuilder::new(catalog, config.context.clone()),
            history,
        )
        .with_record_failures(config.ai.record_failures)
        .with_route_timeout(route_timeout)
    }

    /// Name of the provider tried first.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Provider names in configuration order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.slots.iter().map(ProviderSlot::name).collect()
    }

    /// Slots in the order `route` tries them: primary first, then the rest
    /// in configuration order.
    pub fn trial_order(&self) -> Vec<&ProviderSlot> {
        let primary = self.slots.iter().position(|s| s.name() == self.primary);
        let mut order = Vec::with_capacity(self.slots.len());
        if let Some(index) = primary {
            order.push(&self.slots[index]);
        }
        order.extend(
            self.slots
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != primary)
                .map(|(_, slot)| slot),
        );
        order
    }

    /// Re-read provider credentials from `config`. Returns how many
    /// providers are enabled afterwards.
    pub fn reload_credentials(&self, config: &AppConfig) -> usize {
        for slot in &self.slots {
            if let Some(pc) = config.provider(slot.name()) {
                slot.provider.reload(pc);
            }
        }
        let enabled = self.slots.iter().filter(|s| s.provider.enabled()).count();
        info!(enabled, total = self.slots.len(), "provider credentials reloaded");
        enabled
    }

    /// Answer `query` with the first provider that succeeds.
    pub async fn route(&self, query: &Query) -> Result<String, RouteError> {
        let outcome = match self.route_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.try_providers(query)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        user = %query.user_id(),
                        timeout_ms = limit.as_millis() as u64,
                        "routing deadline exceeded"
                    );
                    if self.record_failures {
                        self.record(QueryRecord::unanswered(query)).await;
                    }
                    return Err(RouteError::DeadlineExceeded(limit));
                }
            },
            None => self.try_providers(query).await,
        };

        match outcome {
            Some((provider, answer)) => {
                self.record(QueryRecord::answered(query, provider, &answer))
                    .await;
                Ok(answer)
            }
            None => {
                warn!(user = %query.user_id(), "all providers exhausted");
                if self.record_failures {
                    self.record(QueryRecord::unanswered(query)).await;
                }
                Err(RouteError::AllProvidersExhausted)
            }
        }
    }

    async fn try_providers(&self, query: &Query) -> Option<(&str, String)> {
        let empty = ContextSnippet::default();
        let mut context: Option<ContextSnippet> = None;

        for slot in self.trial_order() {
            let name = slot.name();
            if !slot.provider.enabled() {
                debug!(provider = %name, "provider disabled, skipping");
                continue;
            }

            let snippet: &ContextSnippet = if slot.provider.uses_context() {
                &*context.get_or_insert_with(|| self.context.build(query))
            } else {
                &empty
            };

            let started = Instant::now();
            match slot.attempt(query, snippet).await {
                Ok(answer) => {
                    info!(
                        provider = %name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "query answered"
                    );
                    return Some((name, answer));
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "provider failed, trying next");
                }
            }
        }
        None
    }

    async fn record(&self, record: QueryRecord) {
        let id = record.id;
        if let Err(e) = self.history.append(record).await {
            warn!(record = %id, error = %e, "failed to record query history");
        }
    }
}
