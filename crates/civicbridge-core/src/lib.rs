#![deny(unsafe_code)]

//! CivicBridge Assist core: AI query orchestration.
//!
//! Turns a citizen's free-text or voice query into a single answer by trying
//! a fixed, ordered registry of AI providers. Each provider sits behind its
//! own token-bucket [`RateLimiter`] and [`RetryPolicy`]; the
//! [`FailoverRouter`] walks the registry until one provider answers, feeds
//! remote providers a bounded [`ContextSnippet`] built from the civic
//! catalog, and records the outcome through a [`HistoryRecorder`].

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, the return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read access to active programs and facilities.
pub mod catalog;
/// Relevance-ranked context assembly for remote providers.
pub mod context;
/// Append-only query history sinks.
pub mod history;
/// Provider trait, error taxonomy, and backend implementations.
pub mod provider;
/// Query value type and validation.
pub mod query;
/// Per-provider token-bucket admission control.
pub mod rate_limit;
/// Fixed-backoff retry for transient failures.
pub mod retry;
/// Ordered failover across providers.
pub mod router;
/// Zeroizing credential storage.
pub mod secret;

pub use catalog::{CatalogError, CivicCatalog, Facility, InMemoryCatalog, Program};
pub use context::{ContextBuilder, ContextEntry, ContextSnippet};
pub use history::{HistoryError, HistoryRecorder, InMemoryHistory, JsonlHistory, QueryRecord};
pub use provider::{Provider, ProviderError};
pub use query::{GeoPoint, Query, QueryChannel, QueryError};
pub use rate_limit::RateLimiter;
pub use retry::{RetryPolicy, Transient};
pub use router::{FailoverRouter, ProviderSlot, RouteError};
pub use secret::{Credential, SecretValue};
