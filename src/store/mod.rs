//! The paste store: content-addressed pastes on top of a wide-column store.
//!
//! Pastes live in a single row keyed by their [`PasteId`], one column per attribute.
//! Writes go out as one batch at the configured consistency level. There is no
//! locking around id assignment; concurrent writes to the same row are settled by
//! the column timestamps, last write wins.

use std::fmt;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::column::{AnyColumnStore, ColumnStore, ColumnStoreError, ConsistencyLevel};
use crate::metrics::SharedMetrics;
use crate::models::{NewPaste, Paste};

mod id;
pub mod schema;

pub use id::PasteId;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid request: {why}")]
    InvalidRequest { why: String },
    #[error("database unavailable")]
    Unavailable,
    #[error("database request timed out")]
    TimedOut,
    #[error("database transport error")]
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Buckets for the error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Unavailable,
    Timeout,
    OsError,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::InvalidRequest => "invalid-request",
            ErrorCategory::Unavailable => "unavailable",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::OsError => "os-error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::InvalidRequest { .. } => ErrorCategory::InvalidRequest,
            StoreError::Unavailable => ErrorCategory::Unavailable,
            StoreError::TimedOut => ErrorCategory::Timeout,
            StoreError::Transport { .. } => ErrorCategory::OsError,
        }
    }
}

impl From<ColumnStoreError> for StoreError {
    fn from(source: ColumnStoreError) -> Self {
        match source {
            ColumnStoreError::InvalidRequest { why } => StoreError::InvalidRequest { why },
            ColumnStoreError::Unavailable => StoreError::Unavailable,
            ColumnStoreError::TimedOut => StoreError::TimedOut,
            ColumnStoreError::Transport { source } => StoreError::Transport { source },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Put,
    Get,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Put => f.write_str("put"),
            Operation::Get => f.write_str("get"),
        }
    }
}

#[derive(Clone)]
pub struct PasteStore<S = AnyColumnStore> {
    client: S,
    column_family: String,
    consistency: ConsistencyLevel,
    metrics: SharedMetrics,
}

impl<S: ColumnStore> PasteStore<S> {
    pub fn new(
        client: S,
        column_family: impl Into<String>,
        consistency: ConsistencyLevel,
        metrics: SharedMetrics,
    ) -> Self {
        PasteStore {
            client,
            column_family: column_family.into(),
            consistency,
            metrics,
        }
    }

    #[cfg(test)]
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Store a paste owned by `owner` and return its id.
    ///
    /// Storing the same data again overwrites the same row.
    pub async fn put(&self, paste: &NewPaste, owner: &str) -> StoreResult<PasteId> {
        let id = PasteId::from_data(&paste.data);

        if paste.data.is_empty() {
            return Err(self.fail(Operation::Put, id.as_str(), invalid("paste data is empty")));
        }
        if owner.is_empty() {
            return Err(self.fail(Operation::Put, id.as_str(), invalid("paste owner is empty")));
        }

        let timestamp = Utc::now().timestamp();
        let mutations = schema::mutations(paste, owner, timestamp);

        self.client
            .write_batch(
                id.as_str(),
                &self.column_family,
                &mutations,
                self.consistency,
            )
            .await
            .map_err(|e| self.fail(Operation::Put, id.as_str(), e.into()))?;

        info!(
            "new paste: id='{id}', owner='{owner}', size={size}",
            size = paste.data.len()
        );

        Ok(id)
    }

    /// Look up a paste. `Ok(None)` means there is no paste with that id.
    pub async fn get(&self, id: &str) -> StoreResult<Option<Paste>> {
        let columns = self
            .client
            .read_columns(
                id,
                &self.column_family,
                &schema::ALL_COLUMNS,
                self.consistency,
            )
            .await
            .map_err(|e| self.fail(Operation::Get, id, e.into()))?;

        match schema::reconstruct(id, columns) {
            Some(paste) => {
                self.metrics.record_found();
                Ok(Some(paste))
            }
            None => {
                self.metrics.record_not_found();
                Ok(None)
            }
        }
    }

    /// Log and count a failure on its way out.
    fn fail(&self, op: Operation, id: &str, error: StoreError) -> StoreError {
        let id = loggable(id);
        match &error {
            StoreError::InvalidRequest { why } => {
                warn!("{op} '{id}': invalid request: {why}")
            }
            StoreError::Unavailable => error!("{op} '{id}': database unavailable"),
            StoreError::TimedOut => error!("{op} '{id}': request to database timed out"),
            StoreError::Transport { source } => {
                error!("{op} '{id}': database transport error: {source}")
            }
        }
        self.metrics.record_error(error.category());
        error
    }
}

fn invalid(why: &str) -> StoreError {
    StoreError::InvalidRequest {
        why: why.to_owned(),
    }
}

/// Ids come straight from request paths, keep them short in the logs.
fn loggable(id: &str) -> String {
    const MAX_CHARS: usize = 64;
    if id.chars().count() > MAX_CHARS {
        let head: String = id.chars().take(MAX_CHARS).collect();
        format!("{head}... ({} bytes)", id.len())
    } else {
        id.to_owned()
    }
}
