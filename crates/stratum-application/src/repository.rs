//! Repository facade
//!
//! A repository is a collection-scoped view over exactly one data adapter,
//! selected by configuration at construction and never rebound afterwards.

use std::sync::Arc;

use serde_json::Value;

use stratum_domain::error::Result;
use stratum_domain::value_objects::{DataVendor, LeanRecord, RepositoryConfig};

use crate::ports::data::{DataAdapter, Filter};
use crate::registry::data::{resolve_data_engine, EngineContext};

/// Collection-scoped persistence facade bound to one engine adapter
#[derive(Clone)]
pub struct Repository {
    adapter: Arc<dyn DataAdapter>,
}

impl Repository {
    /// Build a repository by resolving the configured engine
    pub fn from_config(config: &RepositoryConfig, context: &EngineContext) -> Result<Self> {
        Ok(Self {
            adapter: resolve_data_engine(config, context)?,
        })
    }

    /// Wrap an already-constructed adapter
    pub fn with_adapter(adapter: Arc<dyn DataAdapter>) -> Self {
        Self { adapter }
    }

    /// Engine this repository is bound to
    pub fn vendor(&self) -> DataVendor {
        self.adapter.vendor()
    }

    /// Logical collection name
    pub fn collection(&self) -> &str {
        self.adapter.collection()
    }

    /// Fetch one record by id
    pub async fn find_by_id(&self, id: &str) -> Result<Option<LeanRecord>> {
        self.adapter.find_by_id(id).await
    }

    /// Fetch records matching the filter
    pub async fn find_many(&self, filter: &Filter) -> Result<Vec<LeanRecord>> {
        self.adapter.find_many(filter).await
    }

    /// Persist a new entity
    pub async fn create(&self, entity: Value) -> Result<LeanRecord> {
        self.adapter.create(entity).await
    }

    /// Shallow-merge a partial update
    pub async fn update(&self, id: &str, patch: Value) -> Result<Option<LeanRecord>> {
        self.adapter.update(id, patch).await
    }

    /// Remove a record
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.adapter.delete(id).await
    }

    /// Whether a record exists
    pub async fn exists(&self, id: &str) -> Result<bool> {
        self.adapter.exists(id).await
    }

    /// Normalize an engine-native record
    pub fn to_lean(&self, raw: Value) -> LeanRecord {
        self.adapter.to_lean(raw)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("vendor", &self.adapter.vendor())
            .field("collection", &self.adapter.collection())
            .finish()
    }
}
