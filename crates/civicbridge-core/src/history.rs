//! Append-only query history.
//!
//! Every answered query (and, when configured, every unanswered one) is
//! written once as a [`QueryRecord`]. Records are never updated. Writing
//! history is best effort from the router's point of view: a failed append
//! is logged and the answer is still returned.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use civicbridge_config::HistoryConfig;

use crate::BoxFuture;
use crate::query::{GeoPoint, Query, QueryChannel};

/// One routed query and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub query_text: String,
    pub channel: QueryChannel,
    pub language_tag: String,
    /// Winning provider; `None` when no provider answered.
    pub provider_name: Option<String>,
    pub response_text: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl QueryRecord {
    /// Record of a query a provider answered.
    pub fn answered(query: &Query, provider_name: &str, response: &str) -> Self {
        Self {
            provider_name: Some(provider_name.to_string()),
            response_text: Some(response.to_string()),
            ..Self::unanswered(query)
        }
    }

    /// Record of a query no provider answered.
    pub fn unanswered(query: &Query) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: query.user_id().to_string(),
            query_text: query.text().to_string(),
            channel: query.channel(),
            language_tag: query.language_tag().to_string(),
            provider_name: None,
            response_text: None,
            timestamp: Utc::now(),
            location: query.location(),
        }
    }

    /// Whether a provider produced the response.
    pub fn is_answered(&self) -> bool {
        self.provider_name.is_some()
    }
}

/// Errors from history sinks.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode history record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("history unavailable: {0}")]
    Unavailable(String),
}

/// Append-only sink for query records.
pub trait HistoryRecorder: Send + Sync {
    fn append(&self, record: QueryRecord) -> BoxFuture<'_, Result<(), HistoryError>>;

    /// Records for one user, newest first.
    fn for_user<'a>(&'a self, user_id: &'a str)
    -> BoxFuture<'a, Result<Vec<QueryRecord>, HistoryError>>;
}

/// Build the configured history sink.
pub fn from_config(config: &HistoryConfig) -> Result<Arc<dyn HistoryRecorder>, HistoryError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryHistory::new())),
        "jsonl" => Ok(Arc::new(JsonlHistory::new(&config.path))),
        other => Err(HistoryError::Unavailable(format!(
            "unknown history backend '{other}'"
        ))),
    }
}

/// Newest first; among equal timestamps, later appends first.
fn newest_first(mut records: Vec<QueryRecord>) -> Vec<QueryRecord> {
    records.reverse();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// History kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<QueryRecord>>,
}

impl InMemoryHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in append order.
    pub fn records(&self) -> Vec<QueryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryRecorder for InMemoryHistory {
    fn append(&self, record: QueryRecord) -> BoxFuture<'_, Result<(), HistoryError>> {
        Box::pin(async move {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record);
            Ok(())
        })
    }

    fn for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<QueryRecord>, HistoryError>> {
        Box::pin(async move {
            let matching = self
                .records()
                .into_iter()
                .filter(|r| r.user_id == user_id)
                .collect();
            Ok(newest_first(matching))
        })
    }
}

/// History appended to a JSON-lines file, one record per line.
#[derive(Debug)]
pub struct JsonlHistory {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlHistory {
    /// Append records to the JSON-lines file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<QueryRecord>, HistoryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<QueryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "skipping malformed history line"
                ),
            }
        }
        Ok(records)
    }
}

impl HistoryRecorder for JsonlHistory {
    fn append(&self, record: QueryRecord) -> BoxFuture<'_, Result<(), HistoryError>> {
        Box::pin(async move {
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');

            let _guard = self.write_lock.lock().await;
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;

            debug!(id = %record.id, path = %self.path.display(), "history record appended");
            Ok(())
        })
    }

    fn for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<QueryRecord>, HistoryError>> {
        Box::pin(async move {
            let matching = self
                .read_all()
                .await?
                .into_iter()
                .filter(|r| r.user_id == user_id)
                .collect();
            Ok(newest_first(matching))
        })
    }
}
