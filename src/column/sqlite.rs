//! Column store backed by a single SQLite table.
//!
//! Each cell is one table row keyed by `(family, row_key, name)`. Deletions are kept as
//! tombstone cells with a NULL value so that a later write carrying an older timestamp
//! cannot resurrect a deleted column.

use std::time::Duration;

use anyhow::{bail, Context};
use regex::Regex;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::{
    validate_row_key, Column, ColumnResult, ColumnStore, ColumnStoreError, ConsistencyLevel,
    Mutation,
};

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteStore {
    /// Connect to a database by URL and make sure the keyspace table exists.
    pub async fn connect(
        url: &str,
        keyspace: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,47}$")?;
        if !identifier.is_match(keyspace) {
            bail!("keyspace '{keyspace}' is not a valid identifier");
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {keyspace} (
                family TEXT NOT NULL,
                row_key TEXT NOT NULL,
                name TEXT NOT NULL,
                value BLOB,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (family, row_key, name)
            )"
        ))
        .execute(&pool)
        .await
        .with_context(|| format!("failed to create keyspace table {keyspace}"))?;

        Ok(SqliteStore {
            pool,
            table: keyspace.to_owned(),
        })
    }
}

impl ColumnStore for SqliteStore {
    async fn read_columns(
        &self,
        row_key: &str,
        column_family: &str,
        names: &[&str],
        _consistency: ConsistencyLevel,
    ) -> ColumnResult<Vec<Column>> {
        validate_row_key(row_key)?;
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "SELECT name, value, timestamp FROM {table} \
             WHERE family = ? AND row_key = ? AND name IN ({placeholders}) AND value IS NOT NULL",
            table = self.table
        );

        let mut query = sqlx::query_as::<_, (String, Vec<u8>, i64)>(&sql)
            .bind(column_family)
            .bind(row_key);
        for name in names {
            query = query.bind(*name);
        }

        let mut columns: Vec<Column> = query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(name, value, timestamp)| Column::new(name, value, timestamp))
            .collect();
        columns.sort_by_key(|column| names.iter().position(|name| *name == column.name));

        Ok(columns)
    }

    async fn write_batch(
        &self,
        row_key: &str,
        column_family: &str,
        mutations: &[Mutation],
        _consistency: ConsistencyLevel,
    ) -> ColumnResult<()> {
        validate_row_key(row_key)?;
        if mutations.iter().any(|m| m.name().is_empty()) {
            return Err(ColumnStoreError::InvalidRequest {
                why: "empty column name in batch".to_owned(),
            });
        }

        let sql = format!(
            "INSERT INTO {table} (family, row_key, name, value, timestamp) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (family, row_key, name) DO UPDATE \
             SET value = excluded.value, timestamp = excluded.timestamp \
             WHERE excluded.timestamp > {table}.timestamp \
             OR (excluded.timestamp = {table}.timestamp AND (excluded.value IS NULL \
             OR ({table}.value IS NOT NULL AND excluded.value > {table}.value)))",
            table = self.table
        );

        let mut tx = self.pool.begin().await?;
        for mutation in mutations {
            let value = match mutation {
                Mutation::Insert(column) => Some(column.value.to_vec()),
                Mutation::Delete { .. } => None,
            };
            sqlx::query(&sql)
                .bind(column_family)
                .bind(row_key)
                .bind(mutation.name())
                .bind(value)
                .bind(mutation.timestamp())
                .execute(&mut tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}

impl From<sqlx::Error> for ColumnStoreError {
    fn from(source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::PoolTimedOut => ColumnStoreError::TimedOut,
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => ColumnStoreError::Unavailable,
            sqlx::Error::Database(error) => {
                // extended result codes keep the primary code in the low byte
                let primary = error
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => ColumnStoreError::Unavailable,
                    _ => ColumnStoreError::InvalidRequest {
                        why: error.message().to_owned(),
                    },
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                ColumnStoreError::Transport {
                    source: Box::new(source),
                }
            }
            other => ColumnStoreError::InvalidRequest {
                why: other.to_string(),
            },
        }
    }
}
