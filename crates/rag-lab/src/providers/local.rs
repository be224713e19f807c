//! Persistent local vector store on redb
//!
//! A registry table maps index name to its definition; each index is its own
//! table of record id to JSON record. Queries are exact scans scored by the
//! index metric. All redb work runs on the blocking pool.

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::record::{rank_hits, RecordMetadata};
use crate::types::{IndexHandle, SearchHit, SimilarityMetric, VectorRecord};

use super::vector_store::{VectorBackend, VectorStoreProvider};

const REGISTRY: TableDefinition<&str, &str> = TableDefinition::new("__indexes");

/// Index definition persisted in the registry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct IndexDefinition {
    dimension: usize,
    metric: SimilarityMetric,
}

/// Record body persisted per id
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    vector: Vec<f32>,
    text: String,
    metadata: RecordMetadata,
}

fn table_name(index: &str) -> String {
    format!("idx::{}", index)
}

fn db_err(e: impl Into<redb::Error>) -> Error {
    Error::vector_db(format!("redb: {}", e.into()))
}

/// Local vector store backed by a single redb file
pub struct LocalVectorStore {
    db: Arc<Database>,
}

impl LocalVectorStore {
    /// Open or create the database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        tracing::info!("Opened local vector store at {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .map_err(|e| Error::vector_db(format!("Task join error: {}", e)))?
    }
}

fn lookup_definition(db: &Database, name: &str) -> Result<Option<IndexDefinition>> {
    let txn = db.begin_read().map_err(db_err)?;
    let registry = match txn.open_table(REGISTRY) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(db_err(e)),
    };
    let definition = match registry.get(name).map_err(db_err)? {
        Some(raw) => Some(serde_json::from_str(raw.value())?),
        None => None,
    };
    Ok(definition)
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn initialize_index(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<IndexHandle> {
        let name = name.to_string();
        self.blocking(move |db| {
            if let Some(existing) = lookup_definition(db, &name)? {
                if existing.dimension != dimension {
                    return Err(Error::DimensionMismatch {
                        expected: existing.dimension,
                        actual: dimension,
                    });
                }
                tracing::debug!("Reusing local index {}", name);
                return Ok(IndexHandle::new(name, existing.dimension, existing.metric));
            }

            let definition = serde_json::to_string(&IndexDefinition { dimension, metric })?;
            let table = table_name(&name);
            let txn = db.begin_write().map_err(db_err)?;
            {
                let mut registry = txn.open_table(REGISTRY).map_err(db_err)?;
                registry.insert(name.as_str(), definition.as_str()).map_err(db_err)?;
                txn.open_table(TableDefinition::<&str, &str>::new(&table))
                    .map_err(db_err)?;
            }
            txn.commit().map_err(db_err)?;

            tracing::info!("Created local index {} ({} dims)", name, dimension);
            Ok(IndexHandle::new(name, dimension, metric))
        })
        .await
    }

    async fn upsert(&self, index: &IndexHandle, records: &[VectorRecord]) -> Result<usize> {
        index.check_records(records)?;
        if records.is_empty() {
            return Ok(0);
        }

        let name = index.name.clone();
        let total = records.len();
        let encoded = records
            .iter()
            .map(|r| {
                let body = StoredRecord {
                    vector: r.vector.clone(),
                    text: r.text.clone(),
                    metadata: r.metadata.clone(),
                };
                Ok((r.id.clone(), serde_json::to_string(&body)?))
            })
            .collect::<Result<Vec<(String, String)>>>()?;

        self.blocking(move |db| {
            if lookup_definition(db, &name)?.is_none() {
                return Err(Error::index_not_found("local", name));
            }
            let table = table_name(&name);
            let write = || -> std::result::Result<(), redb::Error> {
                let txn = db.begin_write()?;
                {
                    let mut records = txn.open_table(TableDefinition::<&str, &str>::new(&table))?;
                    for (id, body) in &encoded {
                        records.insert(id.as_str(), body.as_str())?;
                    }
                }
                txn.commit()?;
                Ok(())
            };
            write().map_err(|e| Error::upload("local", total, total, e.to_string()))?;
            tracing::debug!("Upserted {} records into local index {}", total, name);
            Ok(total)
        })
        .await
    }

    async fn query(&self, index: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        index.check_dimension(vector)?;

        let name = index.name.clone();
        let query = vector.to_vec();
        self.blocking(move |db| {
            let definition = lookup_definition(db, &name)?
                .ok_or_else(|| Error::index_not_found("local", name.as_str()))?;
            let table = table_name(&name);

            let txn = db.begin_read().map_err(db_err)?;
            let records = match txn.open_table(TableDefinition::<&str, &str>::new(&table)) {
                Ok(records) => records,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(db_err(e)),
            };

            let mut hits = Vec::new();
            for entry in records.iter().map_err(db_err)? {
                let (id, body) = entry.map_err(db_err)?;
                let record: StoredRecord = serde_json::from_str(body.value())?;
                hits.push(SearchHit {
                    id: id.value().to_string(),
                    score: definition.metric.score(&query, &record.vector),
                    text: record.text,
                });
            }
            Ok(rank_hits(hits, top_k))
        })
        .await
    }

    async fn clear(&self, index: &IndexHandle) -> Result<()> {
        let name = index.name.clone();
        self.blocking(move |db| {
            if lookup_definition(db, &name)?.is_none() {
                return Err(Error::index_not_found("local", name));
            }
            let table = table_name(&name);
            let txn = db.begin_write().map_err(db_err)?;
            {
                let definition = TableDefinition::<&str, &str>::new(&table);
                txn.delete_table(definition).map_err(db_err)?;
                txn.open_table(definition).map_err(db_err)?;
            }
            txn.commit().map_err(db_err)?;
            tracing::info!("Cleared local index {}", name);
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn backend(&self) -> VectorBackend {
        VectorBackend::Local
    }
}
