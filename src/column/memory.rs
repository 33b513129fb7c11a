//! In-process replicated column store.
//!
//! Every replica holds its own copy of the cells. A request only touches as many live
//! replicas as its consistency level needs, picked round-robin, so with more than one
//! replica a read at `One` may land on a replica that never saw the preceding write.
//! Nothing copies data between replicas afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use super::{
    reconcile, validate_row_key, Column, ColumnResult, ColumnStore, ColumnStoreError,
    ConsistencyLevel, Mutation,
};

#[derive(Clone)]
pub struct MemoryStore {
    cluster: Arc<Mutex<Cluster>>,
}

struct Cluster {
    replicas: Vec<Replica>,
    cursor: usize,
}

struct Replica {
    up: bool,
    rows: HashMap<(String, String), BTreeMap<String, Cell>>,
}

#[derive(Debug, Clone)]
struct Cell {
    value: Option<Bytes>,
    timestamp: i64,
}

impl MemoryStore {
    /// A single replica store, which always reads its own writes.
    pub fn new() -> Self {
        Self::with_replicas(1)
    }

    pub fn with_replicas(replicas: usize) -> Self {
        let replicas = (0..replicas.max(1))
            .map(|_| Replica {
                up: true,
                rows: HashMap::new(),
            })
            .collect();

        MemoryStore {
            cluster: Arc::new(Mutex::new(Cluster {
                replicas,
                cursor: 0,
            })),
        }
    }

    #[cfg(test)]
    pub async fn set_replica_up(&self, index: usize, up: bool) {
        self.cluster.lock().await.replicas[index].up = up;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster {
    /// Choose the replicas serving the next request.
    fn pick(&mut self, consistency: ConsistencyLevel) -> ColumnResult<Vec<usize>> {
        let total = self.replicas.len();
        let required = consistency.required(total);

        let chosen: Vec<usize> = (0..total)
            .map(|offset| (self.cursor + offset) % total)
            .filter(|&index| self.replicas[index].up)
            .take(required)
            .collect();

        if chosen.len() < required {
            return Err(ColumnStoreError::Unavailable);
        }

        self.cursor = (self.cursor + 1) % total;
        Ok(chosen)
    }
}

fn check_family(column_family: &str) -> ColumnResult<()> {
    if column_family.is_empty() {
        return Err(ColumnStoreError::InvalidRequest {
            why: "column family must not be empty".to_owned(),
        });
    }
    Ok(())
}

impl ColumnStore for MemoryStore {
    async fn read_columns(
        &self,
        row_key: &str,
        column_family: &str,
        names: &[&str],
        consistency: ConsistencyLevel,
    ) -> ColumnResult<Vec<Column>> {
        validate_row_key(row_key)?;
        check_family(column_family)?;

        let mut cluster = self.cluster.lock().await;
        let chosen = cluster.pick(consistency)?;
        let key = (column_family.to_owned(), row_key.to_owned());

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let mut merged: Option<(Option<&[u8]>, i64)> = None;
            for &index in &chosen {
                let cell = cluster.replicas[index]
                    .rows
                    .get(&key)
                    .and_then(|row| row.get(*name));
                if let Some(cell) = cell {
                    let version = (cell.value.as_deref(), cell.timestamp);
                    merged = Some(match merged {
                        Some(current) => reconcile(current, version),
                        None => version,
                    });
                }
            }

            if let Some((Some(value), timestamp)) = merged {
                columns.push(Column::new(*name, Bytes::copy_from_slice(value), timestamp));
            }
        }

        Ok(columns)
    }

    async fn write_batch(
        &self,
        row_key: &str,
        column_family: &str,
        mutations: &[Mutation],
        consistency: ConsistencyLevel,
    ) -> ColumnResult<()> {
        validate_row_key(row_key)?;
        check_family(column_family)?;
        if let Some(mutation) = mutations.iter().find(|m| m.name().is_empty()) {
            return Err(ColumnStoreError::InvalidRequest {
                why: format!("empty column name at timestamp {}", mutation.timestamp()),
            });
        }

        let mut cluster = self.cluster.lock().await;
        let chosen = cluster.pick(consistency)?;
        let key = (column_family.to_owned(), row_key.to_owned());

        for index in chosen {
            let row = cluster.replicas[index].rows.entry(key.clone()).or_default();
            for mutation in mutations {
                let incoming = match mutation {
                    Mutation::Insert(column) => Cell {
                        value: Some(column.value.clone()),
                        timestamp: column.timestamp,
                    },
                    Mutation::Delete { timestamp, .. } => Cell {
                        value: None,
                        timestamp: *timestamp,
                    },
                };

                let keep_incoming = match row.get(mutation.name()) {
                    Some(existing) => {
                        let winner = reconcile(
                            (existing.value.as_deref(), existing.timestamp),
                            (incoming.value.as_deref(), incoming.timestamp),
                        );
                        winner.1 == incoming.timestamp
                            && winner.0 == incoming.value.as_deref()
                    }
                    None => true,
                };

                if keep_incoming {
                    row.insert(mutation.name().to_owned(), incoming);
                }
            }
        }

        Ok(())
    }
}
