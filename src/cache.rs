//! Metadata cache for created datasets
//!
//! An optional write-through store keyed by dataset name, filled after a
//! dataset has been registered. Writes upsert: saving the same dataset,
//! table or relationship again replaces the earlier entry.

use crate::error::DatabaseError;
use crate::join::JoinSpec;
use crate::types::ColumnDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Dataset-level entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_name: String,
    pub description: String,
    pub tables: Vec<String>,
    pub created_at: String,
}

/// Columns of one table as used by a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub dataset_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub description: String,
}

/// Join relationship between two tables of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    pub dataset_name: String,
    pub source_table: String,
    pub target_table: String,
    pub join_conditions: Vec<JoinSpec>,
}

/// Store for dataset metadata
///
/// Failures are reported as `CacheError`.
#[async_trait]
pub trait MetadataCache: Send + Sync {
    async fn save_dataset(&self, dataset: DatasetMetadata) -> Result<(), DatabaseError>;

    async fn save_table_metadata(&self, table: TableMetadata) -> Result<(), DatabaseError>;

    async fn save_relationship(
        &self,
        relationship: RelationshipMetadata,
    ) -> Result<(), DatabaseError>;

    async fn dataset(&self, dataset_name: &str) -> Result<Option<DatasetMetadata>, DatabaseError>;

    async fn table_metadata(
        &self,
        dataset_name: &str,
        table_name: &str,
    ) -> Result<Option<TableMetadata>, DatabaseError>;

    async fn relationships(
        &self,
        dataset_name: &str,
    ) -> Result<Vec<RelationshipMetadata>, DatabaseError>;
}

/// Cache that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetadataCache;

#[async_trait]
impl MetadataCache for NoopMetadataCache {
    async fn save_dataset(&self, _dataset: DatasetMetadata) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn save_table_metadata(&self, _table: TableMetadata) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn save_relationship(
        &self,
        _relationship: RelationshipMetadata,
    ) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn dataset(&self, _dataset_name: &str) -> Result<Option<DatasetMetadata>, DatabaseError> {
        Ok(None)
    }

    async fn table_metadata(
        &self,
        _dataset_name: &str,
        _table_name: &str,
    ) -> Result<Option<TableMetadata>, DatabaseError> {
        Ok(None)
    }

    async fn relationships(
        &self,
        _dataset_name: &str,
    ) -> Result<Vec<RelationshipMetadata>, DatabaseError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct Entries {
    datasets: BTreeMap<String, DatasetMetadata>,
    tables: BTreeMap<(String, String), TableMetadata>,
    relationships: BTreeMap<(String, String, String), RelationshipMetadata>,
}

/// Process-local cache
#[derive(Default)]
pub struct InMemoryMetadataCache {
    entries: RwLock<Entries>,
}

impl InMemoryMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn require_name(kind: &str, name: &str) -> Result<(), DatabaseError> {
    if name.trim().is_empty() {
        return Err(DatabaseError::CacheError(format!(
            "{} entry needs a dataset name",
            kind
        )));
    }
    Ok(())
}

#[async_trait]
impl MetadataCache for InMemoryMetadataCache {
    async fn save_dataset(&self, dataset: DatasetMetadata) -> Result<(), DatabaseError> {
        require_name("Dataset", &dataset.dataset_name)?;
        self.entries
            .write()
            .await
            .datasets
            .insert(dataset.dataset_name.clone(), dataset);
        Ok(())
    }

    async fn save_table_metadata(&self, table: TableMetadata) -> Result<(), DatabaseError> {
        require_name("Table", &table.dataset_name)?;
        let key = (table.dataset_name.clone(), table.table_name.clone());
        self.entries.write().await.tables.insert(key, table);
        Ok(())
    }

    async fn save_relationship(
        &self,
        relationship: RelationshipMetadata,
    ) -> Result<(), DatabaseError> {
        require_name("Relationship", &relationship.dataset_name)?;
        let key = (
            relationship.dataset_name.clone(),
            relationship.source_table.clone(),
            relationship.target_table.clone(),
        );
        self.entries
            .write()
            .await
            .relationships
            .insert(key, relationship);
        Ok(())
    }

    async fn dataset(&self, dataset_name: &str) -> Result<Option<DatasetMetadata>, DatabaseError> {
        Ok(self.entries.read().await.datasets.get(dataset_name).cloned())
    }

    async fn table_metadata(
        &self,
        dataset_name: &str,
        table_name: &str,
    ) -> Result<Option<TableMetadata>, DatabaseError> {
        let key = (dataset_name.to_string(), table_name.to_string());
        Ok(self.entries.read().await.tables.get(&key).cloned())
    }

    async fn relationships(
        &self,
        dataset_name: &str,
    ) -> Result<Vec<RelationshipMetadata>, DatabaseError> {
        Ok(self
            .entries
            .read()
            .await
            .relationships
            .values()
            .filter(|r| r.dataset_name == dataset_name)
            .cloned()
            .collect())
    }
}
