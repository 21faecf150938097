//! Actix server engine
//!
//! Actix builds its `App` once per worker thread inside a factory closure,
//! so registrations are frozen into a snapshot at listen time and each
//! worker materializes a `Scope` from it. Errors surface through actix's
//! native channel: the engine's error wrapper implements `ResponseError`.
//!
//! The server itself runs inside a dedicated `actix_web::rt::System` thread,
//! which keeps `listen` callable from any tokio context.

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use actix_files::Files;
use actix_web::dev::ServerHandle as ActixServerHandle;
use actix_web::http::{Method, StatusCode};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, ResponseError, Scope};
use tracing::{error, info, warn};

use async_trait::async_trait;
use stratum_application::dispatch::RequestPipeline;
use stratum_application::ports::server::{
    ApiPort, CustomRegistration, HookHandler, PagePort, RouteHandler, ServerHandle,
};
use stratum_application::registry::server::{ServerEngineEntry, SERVER_ENGINES};
use stratum_domain::constants::{CORRELATION_ID_HEADER, SPA_INDEX_FILE};
use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::{
    HookPoint, HttpMethod, PortRequest, PortResponse, ProxyConfig, ServerVendor,
    SpaFallbackConfig, StaticFilesConfig,
};

use super::{brace_path, normalize_prefix, proxy};

const SUPPORTED_HOOKS: [HookPoint; 2] = [HookPoint::RequestReceived, HookPoint::PreHandler];

const BIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Pending registrations handed to custom registrations for downcasting
///
/// Actix materializes its router per worker, so custom code extends the
/// pending registration lists rather than a live router.
pub struct RawActixRoutes {
    /// Routes registered so far
    pub routes: Vec<Arc<dyn RouteHandler>>,
    /// Proxies registered so far
    pub proxies: Vec<ProxyConfig>,
    /// Static mounts registered so far
    pub statics: Vec<StaticFilesConfig>,
}

/// Actix-backed platform engine
pub struct ActixEngine {
    routes: Vec<Arc<dyn RouteHandler>>,
    hooks: Vec<Arc<dyn HookHandler>>,
    proxies: Vec<ProxyConfig>,
    statics: Vec<StaticFilesConfig>,
    spa: Option<SpaFallbackConfig>,
}

impl ActixEngine {
    /// Fresh engine with nothing registered
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            hooks: Vec::new(),
            proxies: Vec::new(),
            statics: Vec::new(),
            spa: None,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            routes: self.routes.clone(),
            pipeline: Arc::new(RequestPipeline::new(self.hooks.clone())),
            proxies: self.proxies.clone(),
            statics: self.statics.clone(),
            spa: self.spa.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Materialize the registrations as a `Scope`
    ///
    /// Used by `listen` per worker, and directly by embedders that mount the
    /// engine into an existing actix `App`.
    pub fn build_scope(&self) -> Scope {
        scope_from(&self.snapshot())
    }
}

impl Default for ActixEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct Snapshot {
    routes: Vec<Arc<dyn RouteHandler>>,
    pipeline: Arc<RequestPipeline>,
    proxies: Vec<ProxyConfig>,
    statics: Vec<StaticFilesConfig>,
    spa: Option<SpaFallbackConfig>,
    client: reqwest::Client,
}

// Native error channel: ResponseError renders the structured error body.
#[derive(Debug)]
struct PortError(Error);

impl std::fmt::Display for PortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for PortError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.0.to_body())
    }
}

fn actix_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn into_port_request(
    request: &HttpRequest,
    payload: &web::Bytes,
) -> std::result::Result<PortRequest, PortError> {
    let method: HttpMethod = request.method().as_str().parse().map_err(PortError)?;

    let mut port = PortRequest::new(method, request.path());
    for (name, value) in request.match_info().iter() {
        port.params.insert(name.to_string(), value.to_string());
    }
    let query = web::Query::<HashMap<String, String>>::from_query(request.query_string())
        .map_err(|e| PortError(Error::bad_request(format!("failed to parse query string: {e}"))))?;
    port.query = query.into_inner();
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            port.headers
                .insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }
    if let Some(correlation_id) = port.headers.get(CORRELATION_ID_HEADER) {
        port.correlation_id = correlation_id.clone();
    }
    if !payload.is_empty() {
        let value = serde_json::from_slice(payload).map_err(|e| {
            PortError(Error::bad_request(format!("request body is not valid JSON: {e}")))
        })?;
        port.body = Some(value);
    }

    Ok(port)
}

fn to_http_response(response: PortResponse) -> HttpResponse {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    for (name, value) in &response.headers {
        builder.insert_header((name.as_str(), value.as_str()));
    }
    match response.body {
        Some(body) => builder.json(body),
        None => builder.finish(),
    }
}

fn port_route(
    method: Method,
    route: Arc<dyn RouteHandler>,
    pipeline: Arc<RequestPipeline>,
) -> actix_web::Route {
    web::route()
        .method(method)
        .to(move |request: HttpRequest, payload: web::Bytes| {
            let route = route.clone();
            let pipeline = pipeline.clone();
            async move {
                let port_request = into_port_request(&request, &payload)?;
                let response = pipeline
                    .dispatch(route.as_ref(), port_request)
                    .await
                    .map_err(PortError)?;
                Ok::<HttpResponse, PortError>(to_http_response(response))
            }
        })
}

fn proxy_route(config: ProxyConfig, client: reqwest::Client) -> actix_web::Route {
    web::route().to(move |request: HttpRequest, payload: web::Bytes| {
        let config = config.clone();
        let client = client.clone();
        async move {
            let port_request = into_port_request(&request, &payload)?;
            let response = proxy::forward(&client, &config, &port_request)
                .await
                .map_err(PortError)?;
            Ok::<HttpResponse, PortError>(to_http_response(response))
        }
    })
}

fn spa_route(config: SpaFallbackConfig) -> actix_web::Route {
    web::route().to(move |request: HttpRequest| {
        let config = config.clone();
        async move {
            let path = request.path().to_string();
            if path.starts_with(&config.api_prefix) {
                return HttpResponse::build(StatusCode::NOT_FOUND)
                    .json(Error::not_found(path).to_body());
            }
            let index = config.static_dir.join(SPA_INDEX_FILE);
            match tokio::fs::read(&index).await {
                Ok(bytes) => HttpResponse::Ok()
                    .content_type("text/html; charset=utf-8")
                    .body(bytes),
                Err(_) => HttpResponse::build(StatusCode::NOT_FOUND)
                    .json(Error::not_found(format!("{}", index.display())).to_body()),
            }
        }
    })
}

fn scope_from(snapshot: &Snapshot) -> Scope {
    let mut scope = web::scope("");
    for route in &snapshot.routes {
        let descriptor = route.descriptor();
        let path = brace_path(&descriptor.url);
        scope = scope.route(
            &path,
            port_route(
                actix_method(descriptor.method),
                route.clone(),
                snapshot.pipeline.clone(),
            ),
        );
    }
    for config in &snapshot.proxies {
        scope = scope.route(
            &format!("{}/{{tail:.*}}", config.prefix),
            proxy_route(config.clone(), snapshot.client.clone()),
        );
        scope = scope.route(
            &config.prefix,
            proxy_route(config.clone(), snapshot.client.clone()),
        );
    }
    for config in &snapshot.statics {
        scope = scope.service(Files::new(&config.mount, &config.dir));
    }
    if let Some(spa) = &snapshot.spa {
        scope = scope.default_service(spa_route(spa.clone()));
    }
    scope
}

#[async_trait]
impl ApiPort for ActixEngine {
    fn vendor(&self) -> ServerVendor {
        ServerVendor::Actix
    }

    fn register_route(&mut self, handler: Arc<dyn RouteHandler>) -> Result<()> {
        let descriptor = handler.descriptor();
        let duplicate = self.routes.iter().any(|existing| {
            let d = existing.descriptor();
            d.url == descriptor.url && d.method == descriptor.method
        });
        if duplicate {
            return Err(Error::handler_registration(format!(
                "route {} {} is already registered",
                descriptor.method, descriptor.url
            ))
            .with_component("actix-engine")
            .with_operation("register_route"));
        }
        self.routes.push(handler);
        Ok(())
    }

    fn register_hook(&mut self, hook: Arc<dyn HookHandler>) -> Result<()> {
        let point = hook.point();
        if !SUPPORTED_HOOKS.contains(&point) {
            warn!(
                vendor = "actix",
                point = %point,
                "hook point is not supported by this engine; hook not registered"
            );
            return Ok(());
        }
        self.hooks.push(hook);
        Ok(())
    }

    fn register_proxy(&mut self, config: ProxyConfig) -> Result<()> {
        let mut config = config;
        config.prefix = normalize_prefix(&config.prefix);
        self.proxies.push(config);
        Ok(())
    }

    async fn listen(&mut self, host: &str, port: u16) -> Result<ServerHandle> {
        let snapshot = Arc::new(self.snapshot());
        let host = host.to_string();

        let (tx, rx) = mpsc::channel::<io::Result<(std::net::SocketAddr, ActixServerHandle)>>();

        std::thread::Builder::new()
            .name("actix-engine".to_string())
            .spawn(move || {
                let system = actix_web::rt::System::new();
                system.block_on(async move {
                    let factory_snapshot = snapshot.clone();
                    let server = match HttpServer::new(move || {
                        App::new().service(scope_from(&factory_snapshot))
                    })
                    .bind((host.as_str(), port))
                    {
                        Ok(server) => server,
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            return;
                        }
                    };
                    let Some(addr) = server.addrs().first().copied() else {
                        let _ = tx.send(Err(io::Error::other("no bound address")));
                        return;
                    };
                    let server = server.run();
                    let handle = server.handle();
                    let _ = tx.send(Ok((addr, handle)));
                    if let Err(e) = server.await {
                        error!(error = %e, "actix server ended unexpectedly");
                    }
                });
            })
            .map_err(|e| {
                Error::internal("failed to spawn the actix engine thread")
                    .with_source(e)
                    .with_component("actix-engine")
                    .with_operation("listen")
            })?;

        let (local_addr, handle) = rx
            .recv_timeout(BIND_TIMEOUT)
            .map_err(|e| {
                Error::internal("actix engine did not report a bind result")
                    .with_source(e)
                    .with_component("actix-engine")
                    .with_operation("listen")
            })?
            .map_err(|e| {
                Error::internal(format!("failed to bind {}: {e}", port))
                    .with_source(e)
                    .with_component("actix-engine")
                    .with_operation("listen")
            })?;

        info!(vendor = "actix", %local_addr, "listening");

        Ok(ServerHandle::new(
            ServerVendor::Actix,
            local_addr,
            Box::new(move || -> futures::future::BoxFuture<'static, ()> {
                Box::pin(async move {
                    handle.stop(false).await;
                })
            }),
        ))
    }

    fn raw_server(&self) -> &dyn Any {
        self
    }
}

impl PagePort for ActixEngine {
    fn register_static_files(&mut self, config: StaticFilesConfig) -> Result<()> {
        let mut config = config;
        config.mount = normalize_prefix(&config.mount);
        self.statics.push(config);
        Ok(())
    }

    fn register_spa_fallback(&mut self, config: SpaFallbackConfig) -> Result<()> {
        let mut config = config;
        config.api_prefix = normalize_prefix(&config.api_prefix);
        self.spa = Some(config);
        Ok(())
    }

    fn register_custom(&mut self, registration: CustomRegistration) -> Result<()> {
        // The native router is rebuilt per worker, so custom code extends
        // the pending registration lists instead of a live router.
        let mut raw = RawActixRoutes {
            routes: std::mem::take(&mut self.routes),
            proxies: std::mem::take(&mut self.proxies),
            statics: std::mem::take(&mut self.statics),
        };
        let result = registration(&mut raw);
        self.routes = raw.routes;
        self.proxies = raw.proxies;
        self.statics = raw.statics;
        result
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn actix_engine_factory() -> std::result::Result<
    Box<dyn stratum_application::ports::server::PlatformEngine>,
    String,
> {
    Ok(Box::new(ActixEngine::new()))
}

#[linkme::distributed_slice(SERVER_ENGINES)]
static ACTIX_ENGINE: ServerEngineEntry = ServerEngineEntry {
    name: "actix",
    description: "Actix Web HTTP server engine",
    factory: actix_engine_factory,
};

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_application::ports::server::{FnHook, FnRoute};
    use stratum_domain::value_objects::RouteDescriptor;

    #[test]
    fn duplicate_routes_are_refused() {
        let mut engine = ActixEngine::new();
        let route = |method, url: &str| {
            FnRoute::shared(RouteDescriptor::new(method, url), |_request| async move {
                Ok(PortResponse::no_content())
            })
        };
        engine.register_route(route(HttpMethod::Get, "/a")).unwrap();
        let err = engine.register_route(route(HttpMethod::Get, "/a")).unwrap_err();
        assert_eq!(err.kind, stratum_domain::ErrorKind::HandlerRegistration);
    }

    #[test]
    fn on_error_hooks_are_not_supported_here() {
        let mut engine = ActixEngine::new();
        engine
            .register_hook(FnHook::shared(HookPoint::OnError, |_request| Ok(())))
            .unwrap();
        assert!(engine.hooks.is_empty());
    }

    #[test]
    fn custom_registration_extends_pending_routes() {
        let mut engine = ActixEngine::new();
        engine
            .register_custom(Box::new(|raw| {
                let raw = raw
                    .downcast_mut::<RawActixRoutes>()
                    .ok_or_else(|| Error::handler_registration("unexpected raw router type"))?;
                raw.routes.push(FnRoute::shared(
                    RouteDescriptor::new(HttpMethod::Get, "/custom"),
                    |_request| async move { Ok(PortResponse::no_content()) },
                ));
                Ok(())
            }))
            .unwrap();
        assert_eq!(engine.routes.len(), 1);
    }
}
