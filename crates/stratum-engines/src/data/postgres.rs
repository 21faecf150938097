//! Postgres data engine
//!
//! The optional heavy backend. Records live in one table per repository:
//! `id TEXT` primary key, entity fields in a `data JSONB` column, and
//! timestamptz bookkeeping columns. The native row shape (`id`,
//! `created_at`, `updated_at`) differs from the document engine's; both
//! normalize to the same lean shape.
//!
//! Connection setup is deferred: a [`PostgresDatabase`] created with
//! [`lazy`](PostgresDatabase::lazy) does no network work until a repository
//! touches it, and concurrent first uses share one in-flight handshake. The
//! orchestrator's eager [`connect`](PostgresDatabase::connect) path performs
//! the handshake at startup instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info};
use uuid::Uuid;

use async_trait::async_trait;
use stratum_application::lazy::LazyEngine;
use stratum_application::ports::data::{DataAdapter, Filter};
use stratum_application::registry::data::{DataEngineEntry, EngineContext, DATA_ENGINES};
use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::{DataVendor, LeanRecord, NativeShape, RepositoryConfig};

const SHAPE: NativeShape = NativeShape {
    id: "id",
    created_at: "created_at",
    updated_at: "updated_at",
};

/// Live postgres backend shared by every repository bound to it
pub struct PostgresDatabase {
    url: String,
    client: LazyEngine<Client>,
}

impl PostgresDatabase {
    /// Connect eagerly, performing the handshake now
    ///
    /// # Errors
    /// `DATABASE_CONNECTION` when the handshake or authentication fails.
    pub async fn connect(url: &str) -> Result<Arc<Self>> {
        let client = raw_connect(url).await.map_err(|e| {
            Error::database_connection(format!("postgres handshake failed: {e}"))
                .with_source(e)
                .with_component("postgres-engine")
                .with_operation("connect")
        })?;
        info!(vendor = "postgres", "database connected");
        Ok(Arc::new(Self {
            url: url.to_string(),
            client: LazyEngine::ready(Arc::new(client)),
        }))
    }

    /// Defer the handshake until a repository first touches the backend
    ///
    /// Concurrent first uses share one pending handshake. A failure surfaces
    /// as `ADAPTER_LOAD` ("engine not available"), distinguishable from
    /// runtime query failures.
    pub fn lazy(url: &str) -> Arc<Self> {
        let url = url.to_string();
        let init_url = url.clone();
        Arc::new(Self {
            url,
            client: LazyEngine::new(move || {
                let url = init_url.clone();
                async move {
                    let client = raw_connect(&url).await.map_err(|e| {
                        Error::adapter_load(format!("postgres engine not available: {e}"))
                            .with_source(e)
                            .with_component("postgres-engine")
                            .with_operation("lazy_connect")
                    })?;
                    info!(vendor = "postgres", "database connected on first use");
                    Ok(Arc::new(client))
                }
            }),
        })
    }

    /// Connection string this backend was configured with
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the handshake has completed
    pub fn is_connected(&self) -> bool {
        self.client.is_initialized()
    }

    /// Get the client, handshaking on first use
    pub async fn client(&self) -> Result<Arc<Client>> {
        self.client.get().await
    }
}

impl std::fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

async fn raw_connect(url: &str) -> std::result::Result<Client, tokio_postgres::Error> {
    let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "postgres connection task ended");
        }
    });
    Ok(client)
}

/// `DataAdapter` over one table of a [`PostgresDatabase`]
pub struct PostgresAdapter {
    db: Arc<PostgresDatabase>,
    table: String,
    name: String,
    schema_ready: OnceCell<()>,
}

impl PostgresAdapter {
    /// Bind an adapter to a table; the identifier must already be validated
    pub fn new(db: Arc<PostgresDatabase>, table: String, name: Option<String>) -> Self {
        let name = name.unwrap_or_else(|| table.clone());
        Self {
            db,
            table,
            name,
            schema_ready: OnceCell::new(),
        }
    }

    async fn ready_client(&self) -> Result<Arc<Client>> {
        let client = self.db.client().await?;
        let table = &self.table;
        self.schema_ready
            .get_or_try_init(|| async {
                let ddl = format!(
                    "CREATE TABLE IF NOT EXISTS {table} (\
                     id TEXT PRIMARY KEY, \
                     data JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
                     created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
                     updated_at TIMESTAMPTZ NOT NULL DEFAULT now())"
                );
                client.batch_execute(&ddl).await.map_err(|e| query_error("create table", e))
            })
            .await?;
        Ok(client)
    }

    fn require_object(value: Value, what: &str) -> Result<Value> {
        if value.is_object() {
            Ok(value)
        } else {
            Err(Error::bad_request(format!("{what} must be a JSON object")))
        }
    }

    fn row_to_native(row: &Row) -> Value {
        let id: String = row.get("id");
        let data: Value = row.get("data");
        let created_at: DateTime<Utc> = row.get("created_at");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        let mut object = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        object.insert(SHAPE.id.to_string(), Value::String(id));
        object.insert(
            SHAPE.created_at.to_string(),
            Value::String(created_at.to_rfc3339()),
        );
        object.insert(
            SHAPE.updated_at.to_string(),
            Value::String(updated_at.to_rfc3339()),
        );
        Value::Object(object)
    }
}

fn query_error(operation: &str, e: tokio_postgres::Error) -> Error {
    Error::internal(format!("postgres {operation} failed: {e}"))
        .with_source(e)
        .with_component("postgres-engine")
        .with_operation("query")
}

#[async_trait]
impl DataAdapter for PostgresAdapter {
    fn vendor(&self) -> DataVendor {
        DataVendor::Postgres
    }

    fn collection(&self) -> &str {
        &self.name
    }

    fn native_shape(&self) -> NativeShape {
        SHAPE
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LeanRecord>> {
        let client = self.ready_client().await?;
        let sql = format!(
            "SELECT id, data, created_at, updated_at FROM {} WHERE id = $1",
            self.table
        );
        let row = client
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(|e| query_error("select", e))?;
        Ok(row.map(|row| self.to_lean(Self::row_to_native(&row))))
    }

    async fn find_many(&self, filter: &Filter) -> Result<Vec<LeanRecord>> {
        let client = self.ready_client().await?;

        let mut sql = format!("SELECT id, data, created_at, updated_at FROM {}", self.table);
        let conditions = Value::Object(filter.conditions.clone());
        if !filter.conditions.is_empty() {
            sql.push_str(" WHERE data @> $1::jsonb");
        }
        sql.push_str(" ORDER BY created_at, id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = if filter.conditions.is_empty() {
            client.query(sql.as_str(), &[]).await
        } else {
            client.query(sql.as_str(), &[&conditions]).await
        }
        .map_err(|e| query_error("select", e))?;

        Ok(rows
            .iter()
            .map(|row| self.to_lean(Self::row_to_native(row)))
            .collect())
    }

    async fn create(&self, entity: Value) -> Result<LeanRecord> {
        let entity = Self::require_object(entity, "entity")?;
        let client = self.ready_client().await?;
        let id = Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO {} (id, data) VALUES ($1, $2::jsonb) \
             RETURNING id, data, created_at, updated_at",
            self.table
        );
        let row = client
            .query_one(sql.as_str(), &[&id, &entity])
            .await
            .map_err(|e| query_error("insert", e))?;
        Ok(self.to_lean(Self::row_to_native(&row)))
    }

    async fn update(&self, id: &str, patch: Value) -> Result<Option<LeanRecord>> {
        let patch = Self::require_object(patch, "patch")?;
        let client = self.ready_client().await?;
        let sql = format!(
            "UPDATE {} SET data = data || $2::jsonb, updated_at = now() WHERE id = $1 \
             RETURNING id, data, created_at, updated_at",
            self.table
        );
        let row = client
            .query_opt(sql.as_str(), &[&id, &patch])
            .await
            .map_err(|e| query_error("update", e))?;
        Ok(row.map(|row| self.to_lean(Self::row_to_native(&row))))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let client = self.ready_client().await?;
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        let deleted = client
            .execute(sql.as_str(), &[&id])
            .await
            .map_err(|e| query_error("delete", e))?;
        Ok(deleted > 0)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let client = self.ready_client().await?;
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", self.table);
        let row = client
            .query_one(sql.as_str(), &[&id])
            .await
            .map_err(|e| query_error("exists", e))?;
        Ok(row.get::<_, bool>(0))
    }
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("table", &self.table)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn validate_identifier(ident: &str) -> std::result::Result<(), String> {
    let mut chars = ident.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(format!("'{ident}' is not a valid table identifier"))
    }
}

fn postgres_engine_factory(
    config: &RepositoryConfig,
    context: &EngineContext,
) -> std::result::Result<Arc<dyn DataAdapter>, String> {
    let (table, name) = match config {
        RepositoryConfig::Postgres { table, name } => (table.clone(), name.clone()),
        other => {
            return Err(format!(
                "postgres engine cannot serve a '{}' repository configuration",
                other.vendor()
            ))
        }
    };
    validate_identifier(&table)?;

    let db = context
        .database::<PostgresDatabase>(DataVendor::Postgres)
        .ok_or_else(|| {
            "postgres engine not available: no postgres database configured".to_string()
        })?;

    Ok(Arc::new(PostgresAdapter::new(db, table, name)))
}

#[linkme::distributed_slice(DATA_ENGINES)]
static POSTGRES_ENGINE: DataEngineEntry = DataEngineEntry {
    name: "postgres",
    description: "Postgres-backed store, connected on first use",
    factory: postgres_engine_factory,
};
