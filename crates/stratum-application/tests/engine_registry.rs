//! Loader resolution against the real engine registrations
//!
//! Linking `stratum-engines` populates the linkme slices, so these tests
//! exercise the same resolution path the kernel uses.

use stratum_application::ports::data::DataAdapter;
use stratum_application::ports::server::ApiPort;
use stratum_application::registry::data::{list_data_engines, resolve_data_engine, EngineContext};
use stratum_application::registry::server::{list_server_engines, resolve_server_engine};
use stratum_application::repository::Repository;
use stratum_domain::value_objects::{CollectionSchema, DataVendor, RepositoryConfig, ServerVendor};
use stratum_domain::ErrorKind;

// Force the engines crate into the link so its registrations exist.
use stratum_engines as _;

fn memory_config(name: &str) -> RepositoryConfig {
    RepositoryConfig::Memory {
        schema: CollectionSchema::named(name),
    }
}

#[test]
fn both_data_engines_are_registered() {
    let engines = list_data_engines();
    let names: Vec<&str> = engines.iter().map(|(name, _)| *name).collect();
    assert!(names.contains(&"memory"));
    assert!(names.contains(&"postgres"));
}

#[test]
fn both_server_engines_are_registered() {
    let engines = list_server_engines();
    let names: Vec<&str> = engines.iter().map(|(name, _)| *name).collect();
    assert!(names.contains(&"axum"));
    assert!(names.contains(&"actix"));
}

#[test]
fn memory_engine_resolves_without_a_configured_database() {
    let adapter = resolve_data_engine(&memory_config("things"), &EngineContext::new()).unwrap();
    assert_eq!(adapter.vendor(), DataVendor::Memory);
    assert_eq!(adapter.collection(), "things");
}

#[test]
fn postgres_without_a_database_reports_engine_unavailable() {
    let config = RepositoryConfig::Postgres {
        table: "things".to_string(),
        name: None,
    };
    let err = resolve_data_engine(&config, &EngineContext::new()).err().unwrap();
    assert_eq!(err.kind, ErrorKind::AdapterLoad);
    assert!(err.message.contains("not available"));
}

#[test]
fn server_engines_resolve_by_vendor_tag() {
    let axum = resolve_server_engine(ServerVendor::Axum).unwrap();
    assert_eq!(axum.vendor(), ServerVendor::Axum);
    let actix = resolve_server_engine(ServerVendor::Actix).unwrap();
    assert_eq!(actix.vendor(), ServerVendor::Actix);
}

#[tokio::test]
async fn repository_stays_bound_to_its_engine() {
    let repository =
        Repository::from_config(&memory_config("things"), &EngineContext::new()).unwrap();
    assert_eq!(repository.vendor(), DataVendor::Memory);

    let record = repository
        .create(serde_json::json!({"title": "bound"}))
        .await
        .unwrap();
    let fetched = repository.find_by_id(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, record.id);
    assert_eq!(repository.vendor(), DataVendor::Memory);
}
