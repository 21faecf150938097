//! Service kernel
//!
//! The orchestrator. One-way state machine:
//!
//! ```text
//! Unconfigured → Validated → DatabasesConnected → LayersBootstrapped
//!              → PlatformsRegistered → Listening
//! ```
//!
//! Every transition is failure-terminal: an error at any step moves the
//! kernel to `Failed`, wraps the cause once with component/operation
//! context, and aborts the remaining steps. There is no retry; the caller
//! owns process-level policy. Validation runs before any side effect, so a
//! misdeclared service type never reaches a database.

pub mod config;
mod databases;

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use stratum_application::ports::server::{
    ApiPort, HookHandler, PagePort, PlatformEngine, RouteHandler, ServerHandle,
};
use stratum_application::registry::data::EngineContext;
use stratum_application::registry::server::resolve_server_engine;
use stratum_application::repository::Repository;
use stratum_domain::error::{Error, Result};

use crate::di::layers::{bootstrap_layers, ConstructorSpec, Layer, LayerPlan};
use crate::di::registry::ServiceRegistry;

pub use config::{
    ApplicationLayerConfig, CliPlatformConfig, DatabaseConfig, DatabaseHandle,
    DesktopPlatformConfig, DomainLayerConfig, EntryPointsConfig, InfrastructureLayerConfig,
    LayersConfig, PlatformsConfig, RepositoryRegistration, RestEntryPoints, RunConfig,
    ServerPlatformConfig, ServiceConfig, ServiceType,
};

/// Kernel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    Unconfigured,
    Validated,
    DatabasesConnected,
    LayersBootstrapped,
    PlatformsRegistered,
    Listening,
    /// Terminal; a failed kernel is never restarted in place
    Failed,
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "Unconfigured",
            Self::Validated => "Validated",
            Self::DatabasesConnected => "DatabasesConnected",
            Self::LayersBootstrapped => "LayersBootstrapped",
            Self::PlatformsRegistered => "PlatformsRegistered",
            Self::Listening => "Listening",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Drives the configured service from nothing to listening
pub struct ServiceKernel {
    config: ServiceConfig,
    registry: Arc<ServiceRegistry>,
    state: KernelState,
    engine_context: Option<EngineContext>,
    platform: Option<Box<dyn PlatformEngine>>,
    handle: Option<ServerHandle>,
}

impl ServiceKernel {
    /// Kernel over a fresh registry
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_registry(config, Arc::new(ServiceRegistry::new()))
    }

    /// Kernel over an existing registry (tests, embedding)
    pub fn with_registry(config: ServiceConfig, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            config,
            registry,
            state: KernelState::Unconfigured,
            engine_context: None,
            platform: None,
            handle: None,
        }
    }

    /// Construct and, when `run.auto` is set, drive the full start sequence
    pub async fn launch(config: ServiceConfig) -> Result<Self> {
        let auto = config.run.auto;
        let mut kernel = Self::new(config);
        if auto {
            kernel.start().await?;
        }
        Ok(kernel)
    }

    /// Current state
    pub fn state(&self) -> KernelState {
        self.state
    }

    /// The registry everything is wired through
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Listening handle, once the kernel reached `Listening`
    pub fn server_handle(&self) -> Option<&ServerHandle> {
        self.handle.as_ref()
    }

    /// Stop the platform engine and consume the kernel
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().await;
        }
    }

    /// Drive validate → connect → bootstrap → register → listen
    pub async fn start(&mut self) -> Result<()> {
        self.validate()?;
        self.connect_databases().await?;
        self.bootstrap_layers().await?;
        self.register_platforms().await?;
        self.listen().await
    }

    /// Check configuration completeness; no side effects
    pub fn validate(&mut self) -> Result<()> {
        self.expect_state(KernelState::Unconfigured, "validate")?;
        match validate_config(&self.config) {
            Ok(()) => {
                self.state = KernelState::Validated;
                info!(service_type = %self.config.service_type, "configuration validated");
                Ok(())
            }
            Err(err) => Err(self.fail(err, "validate")),
        }
    }

    /// Connect configured databases and pre-register their handles
    pub async fn connect_databases(&mut self) -> Result<()> {
        self.expect_state(KernelState::Validated, "connect_databases")?;
        let configs = self
            .config
            .platforms
            .server
            .as_ref()
            .map(|server| server.databases.clone())
            .unwrap_or_default();
        match databases::connect_databases(&configs, &self.registry).await {
            Ok(context) => {
                self.engine_context = Some(context);
                self.state = KernelState::DatabasesConnected;
                Ok(())
            }
            Err(err) => Err(self.fail(err, "connect_databases")),
        }
    }

    /// Construct the three layers in order, validating each
    pub async fn bootstrap_layers(&mut self) -> Result<()> {
        self.expect_state(KernelState::DatabasesConnected, "bootstrap_layers")?;
        match self.do_bootstrap_layers() {
            Ok(()) => {
                self.state = KernelState::LayersBootstrapped;
                Ok(())
            }
            Err(err) => Err(self.fail(err, "bootstrap_layers")),
        }
    }

    /// Construct the platform engine and register entry points against it
    pub async fn register_platforms(&mut self) -> Result<()> {
        self.expect_state(KernelState::LayersBootstrapped, "register_platforms")?;
        match self.do_register_platforms() {
            Ok(()) => {
                self.state = KernelState::PlatformsRegistered;
                Ok(())
            }
            Err(err) => Err(self.fail(err, "register_platforms")),
        }
    }

    /// Begin listening on the configured host and port
    pub async fn listen(&mut self) -> Result<()> {
        self.expect_state(KernelState::PlatformsRegistered, "listen")?;
        let (host, port) = match self.config.platforms.server.as_ref() {
            Some(server) => (server.host.clone(), server.port),
            None => {
                let err = Error::internal("listen reached without a server platform");
                return Err(self.fail(err, "listen"));
            }
        };
        let platform = match self.platform.as_mut() {
            Some(platform) => platform,
            None => {
                let err = Error::internal("listen reached without a platform engine");
                return Err(self.fail(err, "listen"));
            }
        };
        match platform.listen(&host, port).await {
            Ok(handle) => {
                info!(vendor = %handle.vendor(), addr = %handle.local_addr(), "service listening");
                self.handle = Some(handle);
                self.state = KernelState::Listening;
                Ok(())
            }
            Err(err) => Err(self.fail(err, "listen")),
        }
    }

    fn do_bootstrap_layers(&mut self) -> Result<()> {
        let context = self.engine_context.clone().ok_or_else(|| {
            Error::internal("bootstrap reached without an engine context")
                .with_component("kernel")
        })?;

        let mut infrastructure = LayerPlan::new(Layer::Infrastructure);
        for registration in &self.config.layers.infrastructure.repositories {
            let repo_config = registration.config.clone();
            let repo_context = context.clone();
            infrastructure.push(ConstructorSpec::new(registration.token.as_str(), move |_registry| {
                Repository::from_config(&repo_config, &repo_context)
            }));
        }

        let mut domain = LayerPlan::new(Layer::Domain);
        for spec in self
            .config
            .layers
            .domain
            .providers
            .iter()
            .chain(self.config.layers.domain.services.iter())
        {
            domain.push(spec.clone());
        }

        let mut application = LayerPlan::new(Layer::Application);
        if let Some(rest) = self
            .config
            .layers
            .application
            .entry_points
            .as_ref()
            .and_then(|entry_points| entry_points.rest.as_ref())
        {
            for spec in rest.hooks.iter().chain(rest.routes.iter()) {
                application.push(spec.clone());
            }
        }

        bootstrap_layers(&self.registry, &infrastructure, &domain, &application)?;
        Ok(())
    }

    fn do_register_platforms(&mut self) -> Result<()> {
        let server = self.config.platforms.server.clone().ok_or_else(|| {
            Error::internal("platform registration reached without a server platform")
                .with_component("kernel")
        })?;

        let mut engine = resolve_server_engine(server.vendor)?;

        if let Some(rest) = self
            .config
            .layers
            .application
            .entry_points
            .as_ref()
            .and_then(|entry_points| entry_points.rest.as_ref())
        {
            for spec in &rest.hooks {
                let hook = self
                    .registry
                    .resolve::<Arc<dyn HookHandler>>(spec.token())?;
                engine.register_hook((*hook).clone())?;
            }
            for spec in &rest.routes {
                let route = self
                    .registry
                    .resolve::<Arc<dyn RouteHandler>>(spec.token())?;
                engine.register_route((*route).clone())?;
            }
        }

        for proxy in &server.proxies {
            engine.register_proxy(proxy.clone())?;
        }
        for mount in &server.static_files {
            engine.register_static_files(mount.clone())?;
        }
        if let Some(spa) = &server.spa {
            engine.register_spa_fallback(spa.clone())?;
        }

        self.platform = Some(engine);
        Ok(())
    }

    fn expect_state(&self, expected: KernelState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::internal(format!(
                "kernel operation '{operation}' requires state {expected}, current state is {}",
                self.state
            ))
            .with_component("kernel")
            .with_operation(operation))
        }
    }

    // Failure is terminal; the cause keeps the context of whichever
    // component detected it, and the kernel only records where it stopped.
    fn fail(&mut self, err: Error, operation: &'static str) -> Error {
        self.state = KernelState::Failed;
        error!(operation, error = %err, "kernel startup step failed");
        if err.component.is_none() {
            err.with_component("kernel").with_operation(operation)
        } else {
            err
        }
    }
}

impl fmt::Debug for ServiceKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKernel")
            .field("state", &self.state)
            .field("service_type", &self.config.service_type)
            .finish_non_exhaustive()
    }
}

fn validate_config(config: &ServiceConfig) -> Result<()> {
    let fail = |message: String| {
        Error::configuration(message)
            .with_component("kernel")
            .with_operation("validate")
    };

    match config.service_type {
        ServiceType::Server => {
            let server = config
                .platforms
                .server
                .as_ref()
                .ok_or_else(|| fail("service type 'server' requires platforms.server configuration".into()))?;

            let rest = config
                .layers
                .application
                .entry_points
                .as_ref()
                .and_then(|entry_points| entry_points.rest.as_ref());
            if rest.is_none() {
                return Err(fail(
                    "service type 'server' requires application entry points (layers.application.entry_points.rest)".into(),
                ));
            }

            for database in &server.databases {
                if database.vendor == stratum_domain::value_objects::DataVendor::Postgres
                    && database.instance.is_none()
                    && database.connection.is_empty()
                {
                    return Err(fail(
                        "postgres database configuration requires a connection string or a live instance".into(),
                    ));
                }
            }
            Ok(())
        }
        ServiceType::Cli => Err(fail("service type 'cli' is not available in this build".into())),
        ServiceType::Desktop => {
            Err(fail("service type 'desktop' is not available in this build".into()))
        }
    }
}
