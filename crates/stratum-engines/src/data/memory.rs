//! In-memory document engine
//!
//! Default data backend: a concurrent in-process document store. Data is not
//! persisted and is lost on restart. The native record shape is
//! document-style (`_id`, `createdAt`, `updatedAt` as RFC 3339 strings),
//! deliberately different from the postgres row shape so normalization is
//! exercised on both engines.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use async_trait::async_trait;
use stratum_application::ports::data::{DataAdapter, Filter};
use stratum_application::registry::data::{DataEngineEntry, EngineContext, DATA_ENGINES};
use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::{
    CollectionSchema, DataVendor, LeanRecord, NativeShape, RepositoryConfig,
};

const SHAPE: NativeShape = NativeShape {
    id: "_id",
    created_at: "createdAt",
    updated_at: "updatedAt",
};

/// Shared in-memory store, one per configured memory database
///
/// Collections are created on first write. Useful wherever persistence is
/// not required: defaults, tests, ephemeral tooling.
pub struct MemoryDatabase {
    collections: DashMap<String, HashMap<String, Value>>,
}

impl MemoryDatabase {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }

    /// Number of records in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    /// Whether a collection has no records
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("collections", &self.collections.len())
            .finish()
    }
}

/// `DataAdapter` over one collection of a [`MemoryDatabase`]
pub struct MemoryAdapter {
    db: Arc<MemoryDatabase>,
    schema: CollectionSchema,
}

impl MemoryAdapter {
    /// Bind an adapter to a collection of the given store
    pub fn new(db: Arc<MemoryDatabase>, schema: CollectionSchema) -> Self {
        Self { db, schema }
    }

    fn require_object(value: Value, what: &str) -> Result<Map<String, Value>> {
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(Error::bad_request(format!("{what} must be a JSON object"))),
        }
    }
}

#[async_trait]
impl DataAdapter for MemoryAdapter {
    fn vendor(&self) -> DataVendor {
        DataVendor::Memory
    }

    fn collection(&self) -> &str {
        &self.schema.name
    }

    fn native_shape(&self) -> NativeShape {
        SHAPE
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LeanRecord>> {
        let record = self
            .db
            .collections
            .get(&self.schema.name)
            .and_then(|collection| collection.get(id).cloned());
        Ok(record.map(|raw| self.to_lean(raw)))
    }

    async fn find_many(&self, filter: &Filter) -> Result<Vec<LeanRecord>> {
        let mut raw: Vec<Value> = match self.db.collections.get(&self.schema.name) {
            Some(collection) => collection
                .values()
                .filter(|doc| doc.as_object().is_some_and(|obj| filter.matches(obj)))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        // Stable order: creation time, then id.
        raw.sort_by(|a, b| {
            let key = |v: &Value| {
                (
                    v.get(SHAPE.created_at)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    v.get(SHAPE.id).and_then(Value::as_str).unwrap_or_default().to_string(),
                )
            };
            key(a).cmp(&key(b))
        });

        if let Some(limit) = filter.limit {
            raw.truncate(limit);
        }

        Ok(raw.into_iter().map(|doc| self.to_lean(doc)).collect())
    }

    async fn create(&self, entity: Value) -> Result<LeanRecord> {
        let mut doc = Self::require_object(entity, "entity")?;
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        doc.insert(SHAPE.id.to_string(), Value::String(id.clone()));
        doc.insert(SHAPE.created_at.to_string(), Value::String(now.clone()));
        doc.insert(SHAPE.updated_at.to_string(), Value::String(now));

        let stored = Value::Object(doc);
        self.db
            .collections
            .entry(self.schema.name.clone())
            .or_default()
            .insert(id, stored.clone());

        Ok(self.to_lean(stored))
    }

    async fn update(&self, id: &str, patch: Value) -> Result<Option<LeanRecord>> {
        let patch = Self::require_object(patch, "patch")?;

        let mut collection = match self.db.collections.get_mut(&self.schema.name) {
            Some(collection) => collection,
            None => return Ok(None),
        };
        let Some(doc) = collection.get_mut(id) else {
            return Ok(None);
        };
        let Some(object) = doc.as_object_mut() else {
            return Ok(None);
        };

        for (field, value) in patch {
            // The stamped bookkeeping fields are not patchable.
            if field == SHAPE.id || field == SHAPE.created_at || field == SHAPE.updated_at {
                continue;
            }
            object.insert(field, value);
        }
        object.insert(
            SHAPE.updated_at.to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let updated = doc.clone();
        drop(collection);
        Ok(Some(self.to_lean(updated)))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self
            .db
            .collections
            .get_mut(&self.schema.name)
            .map(|mut collection| collection.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self
            .db
            .collections
            .get(&self.schema.name)
            .map(|collection| collection.contains_key(id))
            .unwrap_or(false))
    }
}

impl std::fmt::Debug for MemoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAdapter")
            .field("collection", &self.schema.name)
            .finish()
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn memory_engine_factory(
    config: &RepositoryConfig,
    context: &EngineContext,
) -> std::result::Result<Arc<dyn DataAdapter>, String> {
    let schema = match config {
        RepositoryConfig::Memory { schema } => schema.clone(),
        other => {
            return Err(format!(
                "memory engine cannot serve a '{}' repository configuration",
                other.vendor()
            ))
        }
    };

    // A configured database handle is shared; without one the adapter gets
    // its own private store.
    let db = context
        .database::<MemoryDatabase>(DataVendor::Memory)
        .unwrap_or_else(|| Arc::new(MemoryDatabase::new()));

    Ok(Arc::new(MemoryAdapter::new(db, schema)))
}

#[linkme::distributed_slice(DATA_ENGINES)]
static MEMORY_ENGINE: DataEngineEntry = DataEngineEntry {
    name: "memory",
    description: "In-process document store",
    factory: memory_engine_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> MemoryAdapter {
        MemoryAdapter::new(Arc::new(MemoryDatabase::new()), CollectionSchema::named("things"))
    }

    #[tokio::test]
    async fn created_records_have_the_lean_shape() {
        let adapter = adapter();
        let record = adapter
            .create(serde_json::json!({"title": "one"}))
            .await
            .unwrap();

        assert!(!record.id.is_empty());
        assert_eq!(record.field("title"), Some(&serde_json::json!("one")));
        assert!(record.field("_id").is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn update_merges_and_bumps_updated_at() {
        let adapter = adapter();
        let created = adapter
            .create(serde_json::json!({"title": "one", "count": 1}))
            .await
            .unwrap();

        let updated = adapter
            .update(&created.id, serde_json::json!({"count": 2}))
            .await
            .unwrap()
            .expect("record exists");

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.field("title"), Some(&serde_json::json!("one")));
        assert_eq!(updated.field("count"), Some(&serde_json::json!(2)));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn patch_cannot_overwrite_identity() {
        let adapter = adapter();
        let created = adapter.create(serde_json::json!({"a": 1})).await.unwrap();
        let updated = adapter
            .update(&created.id, serde_json::json!({"_id": "forged", "a": 2}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
    }

    #[tokio::test]
    async fn find_many_filters_and_limits() {
        let adapter = adapter();
        for i in 0..5 {
            adapter
                .create(serde_json::json!({"kind": if i % 2 == 0 { "even" } else { "odd" }, "i": i}))
                .await
                .unwrap();
        }

        let evens = adapter
            .find_many(&Filter::all().eq("kind", "even"))
            .await
            .unwrap();
        assert_eq!(evens.len(), 3);

        let capped = adapter
            .find_many(&Filter::all().eq("kind", "even").with_limit(2))
            .await
            .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn delete_and_exists_round_trip() {
        let adapter = adapter();
        let record = adapter.create(serde_json::json!({"a": 1})).await.unwrap();

        assert!(adapter.exists(&record.id).await.unwrap());
        assert!(adapter.delete(&record.id).await.unwrap());
        assert!(!adapter.exists(&record.id).await.unwrap());
        assert!(!adapter.delete(&record.id).await.unwrap());
        assert!(adapter.find_by_id(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_object_entities_are_rejected() {
        let adapter = adapter();
        let err = adapter.create(serde_json::json!([1, 2])).await.unwrap_err();
        assert_eq!(err.kind, stratum_domain::ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn adapters_share_a_database_handle() {
        let db = Arc::new(MemoryDatabase::new());
        let a = MemoryAdapter::new(db.clone(), CollectionSchema::named("things"));
        let b = MemoryAdapter::new(db.clone(), CollectionSchema::named("things"));

        let record = a.create(serde_json::json!({"shared": true})).await.unwrap();
        assert!(b.exists(&record.id).await.unwrap());
        assert_eq!(db.len("things"), 1);
    }
}
