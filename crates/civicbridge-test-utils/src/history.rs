//! History sinks for tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use civicbridge_core::{BoxFuture, HistoryError, HistoryRecorder, JsonlHistory, QueryRecord};
use tempfile::TempDir;

/// A sink whose appends always fail. Counts attempts.
#[derive(Debug, Default)]
pub struct FailingHistory {
    attempts: AtomicUsize,
}

impl FailingHistory {
    /// Create a sink that fails every append.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends attempted so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl HistoryRecorder for FailingHistory {
    fn append(&self, _record: QueryRecord) -> BoxFuture<'_, Result<(), HistoryError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(HistoryError::Unavailable("history store offline".to_string())) })
    }

    fn for_user<'a>(
        &'a self,
        _user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<QueryRecord>, HistoryError>> {
        Box::pin(async { Err(HistoryError::Unavailable("history store offline".to_string())) })
    }
}

/// A JSON-lines history file in an owned temp directory.
///
/// The temp directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TempHistory {
    pub history: Arc<JsonlHistory>,
    pub path: PathBuf,
    _temp_dir: TempDir,
}

impl TempHistory {
    /// Create a history file in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("history").join("query_history.jsonl");
        Self {
            history: Arc::new(JsonlHistory::new(&path)),
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Raw file content, empty if nothing was written yet.
    pub async fn raw(&self) -> String {
        tokio::fs::read_to_string(&self.path)
            .await
            .unwrap_or_default()
    }
}

impl Default for TempHistory {
    fn default() -> Self {
        Self::new()
    }
}
