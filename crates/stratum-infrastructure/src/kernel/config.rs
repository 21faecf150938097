//! Service configuration
//!
//! The orchestrator's programmatic input: which service type runs, what each
//! layer declares, which platforms exist, and whether startup is automatic.
//! Constructors and live handles make this tree non-serializable by design;
//! the serializable ambient settings live in [`crate::config::AppConfig`].

use std::fmt;
use std::sync::Arc;

use stratum_domain::constants::{DEFAULT_HOST, DEFAULT_PORT};
use stratum_domain::error::Result;
use stratum_domain::value_objects::{
    DataVendor, ProxyConfig, RepositoryConfig, ServerVendor, SpaFallbackConfig, StaticFilesConfig,
};
use stratum_engines::{MemoryDatabase, PostgresDatabase};

use crate::di::layers::ConstructorSpec;

/// Declared service type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceType {
    /// HTTP server service
    #[default]
    Server,
    /// Command-line service (configuration accepted, platform not built)
    Cli,
    /// Desktop service (configuration accepted, platform not built)
    Desktop,
}

impl ServiceType {
    /// Lowercase tag as reported in errors
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Cli => "cli",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live database handle, one per connected vendor
#[derive(Clone)]
pub enum DatabaseHandle {
    /// In-process document store
    Memory(Arc<MemoryDatabase>),
    /// Postgres backend
    Postgres(Arc<PostgresDatabase>),
}

impl DatabaseHandle {
    /// Vendor this handle belongs to
    pub fn vendor(&self) -> DataVendor {
        match self {
            Self::Memory(_) => DataVendor::Memory,
            Self::Postgres(_) => DataVendor::Postgres,
        }
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseHandle").field(&self.vendor()).finish()
    }
}

type ConnectedCallback = Arc<dyn Fn(&DatabaseHandle) -> Result<()> + Send + Sync>;

/// One database the kernel connects at startup
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Backend vendor
    pub vendor: DataVendor,
    /// Connection string; ignored when a live instance is supplied
    pub connection: String,
    /// Externally supplied live instance, used instead of connecting
    pub instance: Option<DatabaseHandle>,
    /// Invoked after the vendor handshake succeeds
    pub on_connected: Option<ConnectedCallback>,
}

impl DatabaseConfig {
    /// In-process document store
    pub fn memory() -> Self {
        Self {
            vendor: DataVendor::Memory,
            connection: String::new(),
            instance: None,
            on_connected: None,
        }
    }

    /// Postgres backend reached via a connection string, handshaking at
    /// startup
    pub fn postgres(connection: impl Into<String>) -> Self {
        Self {
            vendor: DataVendor::Postgres,
            connection: connection.into(),
            instance: None,
            on_connected: None,
        }
    }

    /// Postgres backend that defers its handshake to first repository use
    pub fn postgres_lazy(connection: impl Into<String>) -> Self {
        let connection = connection.into();
        let instance = DatabaseHandle::Postgres(PostgresDatabase::lazy(&connection));
        Self {
            vendor: DataVendor::Postgres,
            connection,
            instance: Some(instance),
            on_connected: None,
        }
    }

    /// Use an externally supplied live instance
    pub fn with_instance(mut self, instance: DatabaseHandle) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Run a callback after the handshake succeeds
    pub fn with_on_connected<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DatabaseHandle) -> Result<()> + Send + Sync + 'static,
    {
        self.on_connected = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("vendor", &self.vendor)
            .field("instance", &self.instance.is_some())
            .field("on_connected", &self.on_connected.is_some())
            .finish_non_exhaustive()
    }
}

/// One repository the infrastructure layer constructs
#[derive(Debug, Clone)]
pub struct RepositoryRegistration {
    /// Registry token the repository binds to
    pub token: String,
    /// Engine-discriminated repository configuration
    pub config: RepositoryConfig,
}

impl RepositoryRegistration {
    /// Bind a repository configuration to a token
    pub fn new(token: impl Into<String>, config: RepositoryConfig) -> Self {
        Self {
            token: token.into(),
            config,
        }
    }
}

/// Infrastructure layer declaration
#[derive(Debug, Clone, Default)]
pub struct InfrastructureLayerConfig {
    /// Repositories registered as singletons
    pub repositories: Vec<RepositoryRegistration>,
}

/// Domain layer declaration
#[derive(Debug, Clone, Default)]
pub struct DomainLayerConfig {
    /// Provider constructors
    pub providers: Vec<ConstructorSpec>,
    /// Service constructors
    pub services: Vec<ConstructorSpec>,
}

/// REST entry points
#[derive(Debug, Clone, Default)]
pub struct RestEntryPoints {
    /// Hook handler constructors; each must resolve to `Arc<dyn HookHandler>`
    pub hooks: Vec<ConstructorSpec>,
    /// Route handler constructors; each must resolve to `Arc<dyn RouteHandler>`
    pub routes: Vec<ConstructorSpec>,
}

/// Application entry points by protocol
#[derive(Debug, Clone, Default)]
pub struct EntryPointsConfig {
    /// REST entry points
    pub rest: Option<RestEntryPoints>,
}

/// Application layer declaration
#[derive(Debug, Clone, Default)]
pub struct ApplicationLayerConfig {
    /// Entry points registered against the platform
    pub entry_points: Option<EntryPointsConfig>,
}

/// All three layer declarations
#[derive(Debug, Clone, Default)]
pub struct LayersConfig {
    pub infrastructure: InfrastructureLayerConfig,
    pub domain: DomainLayerConfig,
    pub application: ApplicationLayerConfig,
}

/// Server platform declaration
#[derive(Debug, Clone)]
pub struct ServerPlatformConfig {
    /// HTTP engine vendor
    pub vendor: ServerVendor,
    /// Bind host
    pub host: String,
    /// Listen port; 0 binds an ephemeral port
    pub port: u16,
    /// Databases connected before layer construction
    pub databases: Vec<DatabaseConfig>,
    /// Reverse proxies
    pub proxies: Vec<ProxyConfig>,
    /// Static file mounts
    pub static_files: Vec<StaticFilesConfig>,
    /// SPA fallback
    pub spa: Option<SpaFallbackConfig>,
}

impl Default for ServerPlatformConfig {
    fn default() -> Self {
        Self {
            vendor: ServerVendor::Axum,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            databases: Vec::new(),
            proxies: Vec::new(),
            static_files: Vec::new(),
            spa: None,
        }
    }
}

/// CLI platform declaration (accepted, not built)
#[derive(Debug, Clone, Default)]
pub struct CliPlatformConfig {}

/// Desktop platform declaration (accepted, not built)
#[derive(Debug, Clone, Default)]
pub struct DesktopPlatformConfig {}

/// Platform declarations by kind
#[derive(Debug, Clone, Default)]
pub struct PlatformsConfig {
    pub server: Option<ServerPlatformConfig>,
    pub cli: Option<CliPlatformConfig>,
    pub desktop: Option<DesktopPlatformConfig>,
}

/// Run behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct RunConfig {
    /// Start the full sequence from `launch`
    pub auto: bool,
}

/// Complete kernel input
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Declared service type
    pub service_type: ServiceType,
    /// Layer declarations
    pub layers: LayersConfig,
    /// Platform declarations
    pub platforms: PlatformsConfig,
    /// Run behavior
    pub run: RunConfig,
}
