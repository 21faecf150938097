//! Data engine registry and adapter loader
//!
//! Selects the concrete [`DataAdapter`] matching a repository
//! configuration's vendor tag. Exactly one adapter is bound per repository
//! instance for its lifetime.
//!
//! ```text
//! RepositoryConfig { type = "postgres", .. }
//!                    │
//!                    ▼
//!         resolve_data_engine(&config, &context)
//!                    │
//!                    ▼
//!         DATA_ENGINES.iter()  ← entries submitted by stratum-engines
//!                    │
//!                    ▼
//!         Arc<dyn DataAdapter>
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::{DataVendor, RepositoryConfig};

use crate::ports::data::DataAdapter;

/// Live backend handles available to engine factories
///
/// The orchestrator connects configured databases and deposits their handles
/// here, keyed by vendor; factories downcast to their concrete handle type.
/// An engine whose handle is absent falls back to its own default (memory)
/// or reports itself unavailable (postgres).
#[derive(Clone, Default)]
pub struct EngineContext {
    databases: HashMap<DataVendor, Arc<dyn Any + Send + Sync>>,
}

impl EngineContext {
    /// Empty context; engines with defaults still work
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit a live backend handle for a vendor
    pub fn insert_database<T: Send + Sync + 'static>(&mut self, vendor: DataVendor, handle: Arc<T>) {
        self.databases.insert(vendor, handle);
    }

    /// Fetch a vendor's handle, downcast to its concrete type
    pub fn database<T: Send + Sync + 'static>(&self, vendor: DataVendor) -> Option<Arc<T>> {
        self.databases
            .get(&vendor)
            .and_then(|handle| handle.clone().downcast::<T>().ok())
    }

    /// Whether a vendor has a live handle
    pub fn has_database(&self, vendor: DataVendor) -> bool {
        self.databases.contains_key(&vendor)
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("databases", &self.databases.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Registry entry for data engines
///
/// Each engine registers itself with
/// `#[linkme::distributed_slice(DATA_ENGINES)]`.
pub struct DataEngineEntry {
    /// Unique vendor tag (e.g. "memory", "postgres")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Factory building an adapter bound to one collection
    pub factory:
        fn(&RepositoryConfig, &EngineContext) -> std::result::Result<Arc<dyn DataAdapter>, String>,
}

// Auto-collection via linkme distributed slices - engines submit entries at compile time
#[linkme::distributed_slice]
pub static DATA_ENGINES: [DataEngineEntry] = [..];

/// Resolve the data engine matching the configuration's vendor tag
///
/// # Errors
/// `ADAPTER_LOAD` when the tag matches no registered engine or the
/// engine's factory fails.
pub fn resolve_data_engine(
    config: &RepositoryConfig,
    context: &EngineContext,
) -> Result<Arc<dyn DataAdapter>> {
    let tag = config.vendor().as_str();

    for entry in DATA_ENGINES {
        if entry.name == tag {
            return (entry.factory)(config, context).map_err(|reason| {
                Error::adapter_load(format!("Failed to load data engine '{tag}': {reason}"))
                    .with_component("engine-loader")
                    .with_operation("resolve_data_engine")
            });
        }
    }

    let available: Vec<&str> = DATA_ENGINES.iter().map(|e| e.name).collect();

    Err(Error::adapter_load(format!(
        "Unknown data engine '{tag}'. Available engines: {available:?}"
    ))
    .with_component("engine-loader")
    .with_operation("resolve_data_engine"))
}

/// List all registered data engines as (name, description) pairs
pub fn list_data_engines() -> Vec<(&'static str, &'static str)> {
    DATA_ENGINES.iter().map(|e| (e.name, e.description)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_downcasts_to_concrete_handle() {
        struct FakeDb(u32);
        let mut context = EngineContext::new();
        context.insert_database(DataVendor::Memory, Arc::new(FakeDb(7)));

        let handle = context.database::<FakeDb>(DataVendor::Memory).expect("handle");
        assert_eq!(handle.0, 7);
        assert!(context.database::<String>(DataVendor::Memory).is_none());
        assert!(!context.has_database(DataVendor::Postgres));
    }
}
