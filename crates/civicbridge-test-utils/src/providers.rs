//! Scripted providers for router tests.
//!
//! A [`ScriptedProvider`] plays back a fixed list of outcomes, one per
//! `process` call, then repeats a fallback outcome forever. It counts every
//! call so tests can assert exactly how often the router invoked it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use civicbridge_config::ProviderConfig;
use civicbridge_core::provider::Provider;
use civicbridge_core::{BoxFuture, ContextSnippet, ProviderError, Query};

type Outcome = Result<String, ProviderError>;

pub struct ScriptedProvider {
    name: String,
    enabled: AtomicBool,
    uses_context: bool,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    contexts: Mutex<Vec<ContextSnippet>>,
}

impl ScriptedProvider {
    fn with_fallback(name: &str, fallback: Outcome) -> Self {
        Self {
            name: name.to_string(),
            enabled: AtomicBool::new(true),
            uses_context: true,
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `text`.
    pub fn answering(name: &str, text: &str) -> Self {
        Self::with_fallback(name, Ok(text.to_string()))
    }

    /// Always fails with `error`.
    pub fn failing_with(name: &str, error: ProviderError) -> Self {
        Self::with_fallback(name, Err(error))
    }

    /// Always fails with a transient network error.
    pub fn flaky(name: &str) -> Self {
        Self::failing_with(name, ProviderError::Network("connection reset".to_string()))
    }

    /// Outcomes returned before the fallback, in order.
    pub fn with_script(self, outcomes: Vec<Outcome>) -> Self {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = outcomes.into();
        self
    }

    /// Report the provider as disabled.
    pub fn disabled(self) -> Self {
        self.enabled.store(false, Ordering::SeqCst);
        self
    }

    /// Behave like an offline provider that ignores the context.
    pub fn without_context(mut self) -> Self {
        self.uses_context = false;
        self
    }

    /// Sleep before every outcome (tokio time, so pausable).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls to `process` so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of every context this provider was handed.
    pub fn contexts(&self) -> Vec<ContextSnippet> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Share the provider with a router.
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn uses_context(&self) -> bool {
        self.uses_context
    }

    fn process<'a>(
        &'a self,
        _query: &'a Query,
        context: &'a ContextSnippet,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.contexts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(context.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        })
    }

    /// Remote kinds are enabled iff the fresh entry carries a credential.
    fn reload(&self, config: &ProviderConfig) {
        if config.kind.is_remote() {
            self.enabled
                .store(config.credential().is_some(), Ordering::SeqCst);
        }
    }
}
