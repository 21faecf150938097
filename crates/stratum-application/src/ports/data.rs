//! Data-access port
//!
//! Engine-agnostic persistence operations. Every adapter speaks
//! `serde_json::Value` entities on the way in and [`LeanRecord`] on the way
//! out; the engine's native record shape never crosses this boundary.

use async_trait::async_trait;
use serde_json::{Map, Value};

use stratum_domain::error::Result;
use stratum_domain::value_objects::{DataVendor, LeanRecord, NativeShape};

/// Equality filter over entity fields
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Field → expected value conjunction
    pub conditions: Map<String, Value>,
    /// Maximum number of records to return
    pub limit: Option<usize>,
}

impl Filter {
    /// Filter matching everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq<S: Into<String>, V: Into<Value>>(mut self, field: S, value: V) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    /// Cap the result count
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a native object satisfies every condition
    pub fn matches(&self, object: &Map<String, Value>) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| object.get(field) == Some(expected))
    }
}

/// Engine-agnostic persistence operations
///
/// One adapter is bound per repository instance for its lifetime; the
/// discriminant in [`stratum_domain::value_objects::RepositoryConfig`]
/// selects which.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    /// Engine tag this adapter is bound to
    fn vendor(&self) -> DataVendor;

    /// Logical collection this adapter operates on
    fn collection(&self) -> &str;

    /// Native field names of the underlying engine
    fn native_shape(&self) -> NativeShape;

    /// Normalize an engine-native record into the canonical lean shape
    fn to_lean(&self, raw: Value) -> LeanRecord {
        LeanRecord::from_native(raw, self.native_shape())
    }

    /// Fetch one record by id
    async fn find_by_id(&self, id: &str) -> Result<Option<LeanRecord>>;

    /// Fetch records matching the filter
    async fn find_many(&self, filter: &Filter) -> Result<Vec<LeanRecord>>;

    /// Persist a new entity, stamping id and timestamps
    async fn create(&self, entity: Value) -> Result<LeanRecord>;

    /// Shallow-merge a partial update into the record
    async fn update(&self, id: &str, patch: Value) -> Result<Option<LeanRecord>>;

    /// Remove a record; `true` when something was deleted
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Whether a record with this id exists
    async fn exists(&self, id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_conjunction() {
        let filter = Filter::all().eq("kind", "book").eq("year", 1984);
        let hit = json!({"kind": "book", "year": 1984, "extra": true});
        let miss = json!({"kind": "book", "year": 2001});
        assert!(filter.matches(hit.as_object().unwrap()));
        assert!(!filter.matches(miss.as_object().unwrap()));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::all().matches(json!({"a": 1}).as_object().unwrap()));
    }
}
