//! Server/platform ports
//!
//! Two contracts per HTTP engine: [`ApiPort`] for route/hook/proxy
//! registration and listening, [`PagePort`] for static files and the SPA
//! fallback. Registration happens before `listen`; the engine materializes
//! its native router from the accumulated descriptors at listen time.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use stratum_domain::error::Result;
use stratum_domain::value_objects::{
    HookPoint, PortRequest, PortResponse, ProxyConfig, RouteDescriptor, ServerVendor,
    SpaFallbackConfig, StaticFilesConfig,
};

/// A registered route: descriptor plus execution
#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Registration descriptor (url template, method, schema)
    fn descriptor(&self) -> &RouteDescriptor;

    /// Handle a normalized request
    async fn execute(&self, request: PortRequest) -> Result<PortResponse>;
}

/// A registered lifecycle hook
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Lifecycle point this hook attaches to
    fn point(&self) -> HookPoint;

    /// Run at the lifecycle point; may mutate the request or commit an
    /// early response
    async fn execute(&self, request: &mut PortRequest) -> Result<()>;
}

type RouteFn =
    Box<dyn Fn(PortRequest) -> BoxFuture<'static, Result<PortResponse>> + Send + Sync>;

/// Closure-backed [`RouteHandler`]
pub struct FnRoute {
    descriptor: RouteDescriptor,
    handler: RouteFn,
}

impl FnRoute {
    /// Wrap an async closure as a route handler
    pub fn new<F, Fut>(descriptor: RouteDescriptor, handler: F) -> Self
    where
        F: Fn(PortRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<PortResponse>> + Send + 'static,
    {
        Self {
            descriptor,
            handler: Box::new(
                move |request: PortRequest| -> BoxFuture<'static, Result<PortResponse>> {
                    Box::pin(handler(request))
                },
            ),
        }
    }

    /// Wrap as the `Arc<dyn RouteHandler>` the ports expect
    pub fn shared<F, Fut>(descriptor: RouteDescriptor, handler: F) -> Arc<dyn RouteHandler>
    where
        F: Fn(PortRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<PortResponse>> + Send + 'static,
    {
        Arc::new(Self::new(descriptor, handler))
    }
}

#[async_trait]
impl RouteHandler for FnRoute {
    fn descriptor(&self) -> &RouteDescriptor {
        &self.descriptor
    }

    async fn execute(&self, request: PortRequest) -> Result<PortResponse> {
        (self.handler)(request).await
    }
}

type HookFn = Box<dyn Fn(&mut PortRequest) -> Result<()> + Send + Sync>;

/// Closure-backed [`HookHandler`]
///
/// Hooks are synchronous closures here; implement [`HookHandler`] directly
/// when a hook genuinely needs to await.
pub struct FnHook {
    point: HookPoint,
    hook: HookFn,
}

impl FnHook {
    /// Wrap a closure as a hook handler
    pub fn new<F>(point: HookPoint, hook: F) -> Self
    where
        F: Fn(&mut PortRequest) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            point,
            hook: Box::new(hook),
        }
    }

    /// Wrap as the `Arc<dyn HookHandler>` the ports expect
    pub fn shared<F>(point: HookPoint, hook: F) -> Arc<dyn HookHandler>
    where
        F: Fn(&mut PortRequest) -> Result<()> + Send + Sync + 'static,
    {
        Arc::new(Self::new(point, hook))
    }
}

#[async_trait]
impl HookHandler for FnHook {
    fn point(&self) -> HookPoint {
        self.point
    }

    async fn execute(&self, request: &mut PortRequest) -> Result<()> {
        (self.hook)(request)
    }
}

type ShutdownFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Handle to a listening server
pub struct ServerHandle {
    vendor: ServerVendor,
    local_addr: SocketAddr,
    shutdown: Option<ShutdownFn>,
}

impl ServerHandle {
    /// Create a handle; `shutdown` stops the engine when invoked
    pub fn new(vendor: ServerVendor, local_addr: SocketAddr, shutdown: ShutdownFn) -> Self {
        Self {
            vendor,
            local_addr,
            shutdown: Some(shutdown),
        }
    }

    /// Engine that is listening
    pub fn vendor(&self) -> ServerVendor {
        self.vendor
    }

    /// Bound socket address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the engine
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown().await;
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("vendor", &self.vendor)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

/// Hook applied to the engine's raw router before listening
///
/// The argument is engine-specific; downcast it (axum hands a
/// `RawAxumRouter`, actix a `RawActixRoutes`).
pub type CustomRegistration = Box<dyn FnOnce(&mut dyn Any) -> Result<()> + Send + Sync>;

/// Engine-agnostic route/hook/proxy registration and listening
#[async_trait]
pub trait ApiPort: Send + Sync {
    /// Engine tag
    fn vendor(&self) -> ServerVendor;

    /// Register a route; duplicate url+method pairs are refused
    fn register_route(&mut self, handler: Arc<dyn RouteHandler>) -> Result<()>;

    /// Register a lifecycle hook
    ///
    /// A point the engine does not support is not registered and a warning
    /// is emitted; the call still succeeds.
    fn register_hook(&mut self, hook: Arc<dyn HookHandler>) -> Result<()>;

    /// Register a reverse proxy under a path prefix
    fn register_proxy(&mut self, config: ProxyConfig) -> Result<()>;

    /// Materialize the native router and start listening
    async fn listen(&mut self, host: &str, port: u16) -> Result<ServerHandle>;

    /// Escape hatch: the engine object itself, for downcasting
    fn raw_server(&self) -> &dyn Any;
}

/// Static files and SPA fallback registration
pub trait PagePort: Send + Sync {
    /// Serve a directory under a mount path
    fn register_static_files(&mut self, config: StaticFilesConfig) -> Result<()>;

    /// Register the SPA fallback: structured 404 under the API prefix,
    /// entry document for everything else unmatched
    fn register_spa_fallback(&mut self, config: SpaFallbackConfig) -> Result<()>;

    /// Apply a custom registration against the raw engine router
    fn register_custom(&mut self, registration: CustomRegistration) -> Result<()>;
}

/// A concrete HTTP engine: both port contracts
pub trait PlatformEngine: ApiPort + PagePort {}

impl<T: ApiPort + PagePort> PlatformEngine for T {}
