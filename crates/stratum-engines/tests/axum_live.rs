//! Live round trips against the axum engine

use std::sync::Arc;

use serde_json::json;

use stratum_application::ports::server::{ApiPort, FnHook, FnRoute, PagePort, RouteHandler};
use stratum_domain::value_objects::{
    FieldKind, HookPoint, HttpMethod, ObjectSchema, PortResponse, ProxyConfig, RouteDescriptor,
    RouteSchema, SpaFallbackConfig, StaticFilesConfig,
};
use stratum_engines::AxumEngine;

fn things_routes() -> Vec<Arc<dyn RouteHandler>> {
    let by_id = FnRoute::shared(
        RouteDescriptor::new(HttpMethod::Get, "/things/:id"),
        |request| async move {
            Ok(PortResponse::ok(json!({
                "id": request.params["id"],
                "q": request.query.get("q"),
            })))
        },
    );
    let create = FnRoute::shared(
        RouteDescriptor::new(HttpMethod::Post, "/things").with_schema(RouteSchema::body(
            ObjectSchema::default().require("name", FieldKind::String),
        )),
        |request| async move { Ok(PortResponse::json(201, json!({ "created": request.body }))) },
    );
    vec![by_id, create]
}

fn deny_hook() -> Arc<dyn stratum_application::ports::server::HookHandler> {
    FnHook::shared(HookPoint::RequestReceived, |request| {
        if request.headers.contains_key("x-deny") {
            request.commit(PortResponse::json(401, json!({"message": "denied"})));
        }
        Ok(())
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn axum_round_trip() {
    let spa_dir = tempfile::tempdir().unwrap();
    std::fs::write(spa_dir.path().join("index.html"), "<html>stratum app</html>").unwrap();
    let assets_dir = tempfile::tempdir().unwrap();
    std::fs::write(assets_dir.path().join("app.css"), "body { margin: 0 }").unwrap();

    let mut engine = AxumEngine::new();
    for route in things_routes() {
        engine.register_route(route).unwrap();
    }
    engine.register_hook(deny_hook()).unwrap();
    engine
        .register_static_files(StaticFilesConfig {
            mount: "/assets".to_string(),
            dir: assets_dir.path().to_path_buf(),
        })
        .unwrap();
    engine
        .register_spa_fallback(SpaFallbackConfig {
            api_prefix: "/api".to_string(),
            static_dir: spa_dir.path().to_path_buf(),
        })
        .unwrap();
    engine
        .register_custom(Box::new(|raw| {
            let raw = raw.downcast_mut::<stratum_engines::RawAxumRouter>().ok_or_else(|| {
                stratum_domain::Error::handler_registration("unexpected raw router type")
            })?;
            let router = raw.0.take().expect("router present");
            raw.0 = Some(router.route("/native", axum::routing::get(|| async { "native" })));
            Ok(())
        }))
        .unwrap();

    let handle = engine.listen("127.0.0.1", 0).await.unwrap();
    let base = format!("http://{}", handle.local_addr());
    let client = reqwest::Client::new();

    // Path and query params reach the handler normalized.
    let response = client
        .get(format!("{base}/things/42?q=x"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], "42");
    assert_eq!(body["q"], "x");

    // Valid body passes the schema.
    let response = client
        .post(format!("{base}/things"))
        .json(&json!({"name": "one"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    // Schema violations surface as structured 422s.
    let response = client
        .post(format!("{base}/things"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION");
    assert!(body["metadata"]["violations"][0]
        .as_str()
        .unwrap()
        .contains("body.name"));

    // A hook that commits early short-circuits the handler.
    let response = client
        .get(format!("{base}/things/42"))
        .header("x-deny", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Unmatched requests under the API prefix get a structured 404.
    let response = client.get(format!("{base}/api/none")).send().await.unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");

    // Everything else unmatched receives the SPA entry document.
    let response = client.get(format!("{base}/some/page")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("stratum app"));

    // Custom registrations land on the raw router.
    let response = client.get(format!("{base}/native")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "native");

    // Static mounts are served from disk.
    let response = client.get(format!("{base}/assets/app.css")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("margin"));

    handle.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn axum_proxy_forwards_to_upstream() {
    // Upstream: a second axum engine with a real route.
    let mut upstream = AxumEngine::new();
    upstream
        .register_route(FnRoute::shared(
            RouteDescriptor::new(HttpMethod::Get, "/echo/:word"),
            |request| async move {
                Ok(PortResponse::ok(json!({ "echo": request.params["word"] })))
            },
        ))
        .unwrap();
    let upstream_handle = upstream.listen("127.0.0.1", 0).await.unwrap();

    let mut engine = AxumEngine::new();
    engine
        .register_proxy(ProxyConfig {
            prefix: "/up".to_string(),
            upstream: format!("http://{}", upstream_handle.local_addr()),
        })
        .unwrap();
    let handle = engine.listen("127.0.0.1", 0).await.unwrap();

    let response = reqwest::get(format!("http://{}/up/echo/hello", handle.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["echo"], "hello");

    handle.stop().await;
    upstream_handle.stop().await;
}
