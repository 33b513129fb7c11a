use std::cmp::Ordering;
#[cfg(feature = "sqlite")]
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::{self, DatabaseKind};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Longest row key the store accepts, in bytes.
pub const MAX_ROW_KEY_LEN: usize = u16::MAX as usize;

pub type ColumnResult<T> = std::result::Result<T, ColumnStoreError>;

/// Failure kinds reported by a column store client.
#[derive(Error, Debug)]
pub enum ColumnStoreError {
    #[error("invalid request: {why}")]
    InvalidRequest { why: String },
    #[error("not enough replicas available")]
    Unavailable,
    #[error("request timed out")]
    TimedOut,
    #[error("transport error")]
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// How many replicas have to answer before a request counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyLevel {
    #[default]
    One,
    Quorum,
    All,
}

impl ConsistencyLevel {
    /// Number of acknowledgements needed out of `replicas`.
    pub fn required(self, replicas: usize) -> usize {
        match self {
            ConsistencyLevel::One => 1,
            ConsistencyLevel::Quorum => replicas / 2 + 1,
            ConsistencyLevel::All => replicas,
        }
    }
}

/// A single named cell of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value: Bytes,
    pub timestamp: i64,
}

impl Column {
    pub fn new(name: impl Into<String>, value: impl Into<Bytes>, timestamp: i64) -> Self {
        Column {
            name: name.into(),
            value: value.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert(Column),
    Delete { name: String, timestamp: i64 },
}

impl Mutation {
    pub fn delete(name: impl Into<String>, timestamp: i64) -> Self {
        Mutation::Delete {
            name: name.into(),
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Mutation::Insert(column) => &column.name,
            Mutation::Delete { name, .. } => name,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Mutation::Insert(column) => column.timestamp,
            Mutation::Delete { timestamp, .. } => *timestamp,
        }
    }
}

pub trait ColumnStore {
    /// Read the named columns of one row. Missing columns are simply left out.
    async fn read_columns(
        &self,
        row_key: &str,
        column_family: &str,
        names: &[&str],
        consistency: ConsistencyLevel,
    ) -> ColumnResult<Vec<Column>>;

    /// Apply a set of column writes and deletions to one row as a single request.
    async fn write_batch(
        &self,
        row_key: &str,
        column_family: &str,
        mutations: &[Mutation],
        consistency: ConsistencyLevel,
    ) -> ColumnResult<()>;
}

#[derive(Clone)]
pub enum AnyColumnStore {
    Memory(memory::MemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteStore),
}

impl ColumnStore for AnyColumnStore {
    async fn read_columns(
        &self,
        row_key: &str,
        column_family: &str,
        names: &[&str],
        consistency: ConsistencyLevel,
    ) -> ColumnResult<Vec<Column>> {
        match self {
            AnyColumnStore::Memory(memory) => {
                memory
                    .read_columns(row_key, column_family, names, consistency)
                    .await
            }
            #[cfg(feature = "sqlite")]
            AnyColumnStore::Sqlite(sqlite) => {
                sqlite
                    .read_columns(row_key, column_family, names, consistency)
                    .await
            }
        }
    }

    async fn write_batch(
        &self,
        row_key: &str,
        column_family: &str,
        mutations: &[Mutation],
        consistency: ConsistencyLevel,
    ) -> ColumnResult<()> {
        match self {
            AnyColumnStore::Memory(memory) => {
                memory
                    .write_batch(row_key, column_family, mutations, consistency)
                    .await
            }
            #[cfg(feature = "sqlite")]
            AnyColumnStore::Sqlite(sqlite) => {
                sqlite
                    .write_batch(row_key, column_family, mutations, consistency)
                    .await
            }
        }
    }
}

impl From<memory::MemoryStore> for AnyColumnStore {
    fn from(value: memory::MemoryStore) -> Self {
        AnyColumnStore::Memory(value)
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlite::SqliteStore> for AnyColumnStore {
    fn from(value: sqlite::SqliteStore) -> Self {
        AnyColumnStore::Sqlite(value)
    }
}

/// Open the configured backend. Called once at startup.
pub async fn connect(config: &config::Database) -> anyhow::Result<AnyColumnStore> {
    let store: AnyColumnStore = match config.kind {
        DatabaseKind::Memory => {
            info!("using in-memory column store with {} replica(s)", config.replicas);
            memory::MemoryStore::with_replicas(config.replicas).into()
        }
        #[cfg(feature = "sqlite")]
        DatabaseKind::Sqlite => {
            info!(
                "connecting to {url}, keyspace '{keyspace}'",
                url = config.url,
                keyspace = config.keyspace
            );
            sqlite::SqliteStore::connect(
                &config.url,
                &config.keyspace,
                config.max_connections,
                Duration::from_secs(config.connect_timeout_secs),
            )
            .await?
            .into()
        }
    };
    Ok(store)
}

/// Reject row keys the backend could never store.
pub fn validate_row_key(row_key: &str) -> ColumnResult<()> {
    if row_key.is_empty() {
        return Err(ColumnStoreError::InvalidRequest {
            why: "row key must not be empty".to_owned(),
        });
    }
    if row_key.len() > MAX_ROW_KEY_LEN {
        return Err(ColumnStoreError::InvalidRequest {
            why: format!(
                "row key is {} bytes, at most {MAX_ROW_KEY_LEN} allowed",
                row_key.len()
            ),
        });
    }
    Ok(())
}

/// Decide which of two versions of the same cell survives. `None` values are deletions.
///
/// The newer timestamp wins. On a tie a deletion beats a value, and of two values the
/// greater byte string wins, so every replica settles on the same cell.
pub fn reconcile<'a>(
    a: (Option<&'a [u8]>, i64),
    b: (Option<&'a [u8]>, i64),
) -> (Option<&'a [u8]>, i64) {
    match a.1.cmp(&b.1) {
        Ordering::Greater => a,
        Ordering::Less => b,
        Ordering::Equal => match (a.0, b.0) {
            (None, _) => a,
            (_, None) => b,
            (Some(x), Some(y)) => {
                if x >= y {
                    a
                } else {
                    b
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_timestamp_wins() {
        let old = (Some(&b"old"[..]), 1);
        let new = (Some(&b"new"[..]), 2);
        assert_eq!(reconcile(old, new), new);
        assert_eq!(reconcile(new, old), new);
    }

    #[test]
    fn deletion_wins_a_timestamp_tie() {
        let value = (Some(&b"T1"[..]), 5);
        let tombstone = (None, 5);
        assert_eq!(reconcile(value, tombstone), tombstone);
        assert_eq!(reconcile(tombstone, value), tombstone);
    }

    #[test]
    fn greater_value_wins_a_timestamp_tie() {
        let a = (Some(&b"alice"[..]), 5);
        let b = (Some(&b"bob"[..]), 5);
        assert_eq!(reconcile(a, b), b);
        assert_eq!(reconcile(b, a), b);
    }

    #[test]
    fn required_acknowledgements() {
        assert_eq!(ConsistencyLevel::One.required(3), 1);
        assert_eq!(ConsistencyLevel::Quorum.required(3), 2);
        assert_eq!(ConsistencyLevel::Quorum.required(4), 3);
        assert_eq!(ConsistencyLevel::All.required(3), 3);
    }

    #[test]
    fn row_key_bounds() {
        assert!(validate_row_key("uU0nuZN").is_ok());
        assert!(matches!(
            validate_row_key(""),
            Err(ColumnStoreError::InvalidRequest { .. })
        ));
        let huge = "x".repeat(MAX_ROW_KEY_LEN + 1);
        assert!(matches!(
            validate_row_key(&huge),
            Err(ColumnStoreError::InvalidRequest { .. })
        ));
    }
}
