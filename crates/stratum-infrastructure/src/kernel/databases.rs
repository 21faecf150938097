//! Database connection step
//!
//! Connects every configured database (or adopts an externally supplied
//! live instance), runs the post-connect callback, and pre-registers each
//! handle in the registry keyed by its concrete instance type so repository
//! constructors can resolve a live connection synchronously during
//! bootstrap.

use std::sync::Arc;

use tracing::info;

use stratum_application::registry::data::EngineContext;
use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::DataVendor;
use stratum_engines::{MemoryDatabase, PostgresDatabase};

use crate::di::registry::ServiceRegistry;

use super::config::{DatabaseConfig, DatabaseHandle};

pub(crate) async fn connect_databases(
    configs: &[DatabaseConfig],
    registry: &ServiceRegistry,
) -> Result<EngineContext> {
    let mut context = EngineContext::new();

    for config in configs {
        let handle = match &config.instance {
            Some(instance) => {
                if instance.vendor() != config.vendor {
                    return Err(Error::configuration(format!(
                        "database config declares vendor '{}' but the supplied instance is '{}'",
                        config.vendor,
                        instance.vendor()
                    ))
                    .with_component("kernel")
                    .with_operation("connect_databases"));
                }
                instance.clone()
            }
            None => match config.vendor {
                DataVendor::Memory => DatabaseHandle::Memory(Arc::new(MemoryDatabase::new())),
                DataVendor::Postgres => {
                    DatabaseHandle::Postgres(PostgresDatabase::connect(&config.connection).await?)
                }
            },
        };

        if let Some(callback) = &config.on_connected {
            callback(&handle)?;
        }

        match &handle {
            DatabaseHandle::Memory(db) => {
                registry.register_instance(db.clone());
                context.insert_database(DataVendor::Memory, db.clone());
            }
            DatabaseHandle::Postgres(db) => {
                registry.register_instance(db.clone());
                context.insert_database(DataVendor::Postgres, db.clone());
            }
        }
        info!(vendor = %config.vendor, "database ready and pre-registered");
    }

    Ok(context)
}
