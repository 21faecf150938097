//! Axum server engine
//!
//! Registrations accumulate on the engine; the native `Router` is
//! materialized when `listen` is called. Errors surface through axum's
//! native channel: the engine's error wrapper implements `IntoResponse`,
//! so validation and handler failures become structured JSON responses
//! without ever being swallowed.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, Request};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, on, MethodFilter};
use axum::Router;
use tower_http::services::ServeDir;
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

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const SUPPORTED_HOOKS: [HookPoint; 3] = [
    HookPoint::RequestReceived,
    HookPoint::PreHandler,
    HookPoint::OnError,
];

/// Raw router handed to custom registrations for downcasting
///
/// `Router` methods consume the router, so it travels inside an `Option`;
/// take it, extend it, put it back.
pub struct RawAxumRouter(pub Option<Router>);

/// Axum-backed platform engine
pub struct AxumEngine {
    routes: Vec<Arc<dyn RouteHandler>>,
    hooks: Vec<Arc<dyn HookHandler>>,
    proxies: Vec<ProxyConfig>,
    statics: Vec<StaticFilesConfig>,
    spa: Option<SpaFallbackConfig>,
    custom: Vec<CustomRegistration>,
}

impl AxumEngine {
    /// Fresh engine with nothing registered
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            hooks: Vec::new(),
            proxies: Vec::new(),
            statics: Vec::new(),
            spa: None,
            custom: Vec::new(),
        }
    }
}

impl Default for AxumEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Native error channel: the wrapper renders the structured error body.
struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.0.to_body())).into_response()
    }
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
    }
}

async fn into_port_request(
    request: Request,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
) -> Result<PortRequest> {
    let (parts, body) = request.into_parts();
    let method: HttpMethod = parts.method.as_str().parse()?;

    let mut port = PortRequest::new(method, parts.uri.path());
    port.params = params;
    port.query = query;
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            port.headers
                .insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }
    if let Some(correlation_id) = port.headers.get(CORRELATION_ID_HEADER) {
        port.correlation_id = correlation_id.clone();
    }

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| Error::bad_request(format!("failed to read request body: {e}")))?;
    if !bytes.is_empty() {
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::bad_request(format!("request body is not valid JSON: {e}")))?;
        port.body = Some(value);
    }

    Ok(port)
}

fn to_response(response: PortResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let has_content_type = response
        .headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case("content-type"));

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let built = match response.body {
        Some(body) => {
            if !has_content_type {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
            }
            let bytes = serde_json::to_vec(&body).unwrap_or_default();
            builder.body(Body::from(bytes))
        }
        None => builder.body(Body::empty()),
    };
    built.unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn route_service(
    route: Arc<dyn RouteHandler>,
    pipeline: Arc<RequestPipeline>,
) -> axum::routing::MethodRouter {
    let filter = method_filter(route.descriptor().method);
    let handler = move |Path(params): Path<HashMap<String, String>>,
                        Query(query): Query<HashMap<String, String>>,
                        request: Request| {
        let route = route.clone();
        let pipeline = pipeline.clone();
        async move {
            let port_request = into_port_request(request, params, query)
                .await
                .map_err(ApiError)?;
            let response = pipeline
                .dispatch(route.as_ref(), port_request)
                .await
                .map_err(ApiError)?;
            Ok::<Response, ApiError>(to_response(response))
        }
    };
    on(filter, handler)
}

#[async_trait]
impl ApiPort for AxumEngine {
    fn vendor(&self) -> ServerVendor {
        ServerVendor::Axum
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
            .with_component("axum-engine")
            .with_operation("register_route"));
        }
        self.routes.push(handler);
        Ok(())
    }

    fn register_hook(&mut self, hook: Arc<dyn HookHandler>) -> Result<()> {
        let point = hook.point();
        if !SUPPORTED_HOOKS.contains(&point) {
            warn!(
                vendor = "axum",
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
        let pipeline = Arc::new(RequestPipeline::new(self.hooks.clone()));
        let mut router = Router::new();

        for route in &self.routes {
            let path = brace_path(&route.descriptor().url);
            router = router.route(&path, route_service(route.clone(), pipeline.clone()));
        }

        let client = reqwest::Client::new();
        for config in &self.proxies {
            let handler = {
                let config = config.clone();
                let client = client.clone();
                move |Query(query): Query<HashMap<String, String>>, request: Request| {
                    let config = config.clone();
                    let client = client.clone();
                    async move {
                        let port_request = into_port_request(request, HashMap::new(), query)
                            .await
                            .map_err(ApiError)?;
                        let response = proxy::forward(&client, &config, &port_request)
                            .await
                            .map_err(ApiError)?;
                        Ok::<Response, ApiError>(to_response(response))
                    }
                }
            };
            router = router.route(&format!("{}/{{*tail}}", config.prefix), any(handler.clone()));
            router = router.route(&config.prefix, any(handler));
        }

        for config in &self.statics {
            router = router.nest_service(&config.mount, ServeDir::new(&config.dir));
        }

        if let Some(spa) = &self.spa {
            let api_prefix = spa.api_prefix.clone();
            let index = spa.static_dir.join(SPA_INDEX_FILE);
            router = router.fallback(move |request: Request| {
                let api_prefix = api_prefix.clone();
                let index = index.clone();
                async move {
                    let path = request.uri().path().to_string();
                    if path.starts_with(&api_prefix) {
                        return ApiError(Error::not_found(path)).into_response();
                    }
                    match tokio::fs::read(&index).await {
                        Ok(bytes) => Response::builder()
                            .status(StatusCode::OK)
                            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
                            .body(Body::from(bytes))
                            .unwrap_or_else(|_| {
                                StatusCode::INTERNAL_SERVER_ERROR.into_response()
                            }),
                        Err(e) => ApiError(
                            Error::not_found(format!("{}", index.display())).with_source(e),
                        )
                        .into_response(),
                    }
                }
            });
        }

        for registration in self.custom.drain(..) {
            let mut raw = RawAxumRouter(Some(router));
            registration(&mut raw)?;
            router = raw.0.take().ok_or_else(|| {
                Error::handler_registration("custom registration consumed the axum router")
                    .with_component("axum-engine")
            })?;
        }

        let addr = format!("{host}:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            Error::internal(format!("failed to bind {addr}: {e}"))
                .with_source(e)
                .with_component("axum-engine")
                .with_operation("listen")
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            Error::internal("failed to read bound address")
                .with_source(e)
                .with_component("axum-engine")
        })?;

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "axum server ended unexpectedly");
            }
        });
        info!(vendor = "axum", %local_addr, "listening");

        Ok(ServerHandle::new(
            ServerVendor::Axum,
            local_addr,
            Box::new(move || -> futures::future::BoxFuture<'static, ()> {
                Box::pin(async move {
                    task.abort();
                })
            }),
        ))
    }

    fn raw_server(&self) -> &dyn Any {
        self
    }
}

impl PagePort for AxumEngine {
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
        self.custom.push(registration);
        Ok(())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn axum_engine_factory() -> std::result::Result<
    Box<dyn stratum_application::ports::server::PlatformEngine>,
    String,
> {
    Ok(Box::new(AxumEngine::new()))
}

#[linkme::distributed_slice(SERVER_ENGINES)]
static AXUM_ENGINE: ServerEngineEntry = ServerEngineEntry {
    name: "axum",
    description: "Axum HTTP server engine",
    factory: axum_engine_factory,
};

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_application::ports::server::FnRoute;
    use stratum_domain::value_objects::RouteDescriptor;

    fn noop_route(method: HttpMethod, url: &str) -> Arc<dyn RouteHandler> {
        FnRoute::shared(RouteDescriptor::new(method, url), |_request| async move {
            Ok(PortResponse::no_content())
        })
    }

    #[test]
    fn duplicate_routes_are_refused() {
        let mut engine = AxumEngine::new();
        engine.register_route(noop_route(HttpMethod::Get, "/a")).unwrap();
        engine.register_route(noop_route(HttpMethod::Post, "/a")).unwrap();
        let err = engine
            .register_route(noop_route(HttpMethod::Get, "/a"))
            .unwrap_err();
        assert_eq!(err.kind, stratum_domain::ErrorKind::HandlerRegistration);
    }

    #[test]
    fn unsupported_hook_points_are_skipped_with_a_warning() {
        let mut engine = AxumEngine::new();
        let hook = stratum_application::ports::server::FnHook::shared(
            HookPoint::OnResponse,
            |_request| Ok(()),
        );
        engine.register_hook(hook).unwrap();
        assert!(engine.hooks.is_empty());
    }
}
