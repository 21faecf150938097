//! Round trips against the actix engine
//!
//! Most cases run through `test::init_service` on the engine's scope; one
//! test drives the real `listen` path on its dedicated system thread.

use actix_web::{test, App};
use serde_json::json;

use stratum_application::ports::server::{ApiPort, FnHook, FnRoute, PagePort};
use stratum_domain::value_objects::{
    FieldKind, HookPoint, HttpMethod, ObjectSchema, PortResponse, RouteDescriptor, RouteSchema,
    SpaFallbackConfig, StaticFilesConfig,
};
use stratum_engines::ActixEngine;

fn configured_engine(spa_dir: &std::path::Path, assets_dir: &std::path::Path) -> ActixEngine {
    let mut engine = ActixEngine::new();
    engine
        .register_static_files(StaticFilesConfig {
            mount: "/assets".to_string(),
            dir: assets_dir.to_path_buf(),
        })
        .unwrap();
    engine
        .register_route(FnRoute::shared(
            RouteDescriptor::new(HttpMethod::Get, "/things/:id"),
            |request| async move {
                Ok(PortResponse::ok(json!({
                    "id": request.params["id"],
                    "q": request.query.get("q"),
                })))
            },
        ))
        .unwrap();
    engine
        .register_route(FnRoute::shared(
            RouteDescriptor::new(HttpMethod::Post, "/things").with_schema(RouteSchema::body(
                ObjectSchema::default().require("name", FieldKind::String),
            )),
            |request| async move {
                Ok(PortResponse::json(201, json!({ "created": request.body })))
            },
        ))
        .unwrap();
    engine
        .register_hook(FnHook::shared(HookPoint::RequestReceived, |request| {
            if request.headers.contains_key("x-deny") {
                request.commit(PortResponse::json(401, json!({"message": "denied"})));
            }
            Ok(())
        }))
        .unwrap();
    engine
        .register_spa_fallback(SpaFallbackConfig {
            api_prefix: "/api".to_string(),
            static_dir: spa_dir.to_path_buf(),
        })
        .unwrap();
    engine
}

#[actix_web::test]
async fn actix_round_trip() {
    let spa_dir = tempfile::tempdir().unwrap();
    std::fs::write(spa_dir.path().join("index.html"), "<html>stratum app</html>").unwrap();
    let assets_dir = tempfile::tempdir().unwrap();
    std::fs::write(assets_dir.path().join("app.css"), "body { margin: 0 }").unwrap();

    let engine = configured_engine(spa_dir.path(), assets_dir.path());
    let app = test::init_service(App::new().service(engine.build_scope())).await;

    let response = test::call_service(
        &app,
        test::TestRequest::get().uri("/things/42?q=x").to_request(),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["id"], "42");
    assert_eq!(body["q"], "x");

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/things")
            .set_json(json!({"name": "one"}))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), 201);

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/things")
            .set_json(json!({}))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), 422);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["code"], "VALIDATION");

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/things/42")
            .insert_header(("x-deny", "1"))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), 401);

    let response = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/none").to_request(),
    )
    .await;
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");

    let response = test::call_service(
        &app,
        test::TestRequest::get().uri("/some/page").to_request(),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body = test::read_body(response).await;
    assert!(String::from_utf8_lossy(&body).contains("stratum app"));

    let response = test::call_service(
        &app,
        test::TestRequest::get().uri("/assets/app.css").to_request(),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body = test::read_body(response).await;
    assert!(String::from_utf8_lossy(&body).contains("margin"));
}

#[tokio::test(flavor = "multi_thread")]
async fn actix_listen_serves_on_its_own_system_thread() {
    let mut engine = ActixEngine::new();
    engine
        .register_route(FnRoute::shared(
            RouteDescriptor::new(HttpMethod::Get, "/health"),
            |_request| async move { Ok(PortResponse::ok(json!({"status": "up"}))) },
        ))
        .unwrap();

    let handle = engine.listen("127.0.0.1", 0).await.unwrap();

    let response = reqwest::get(format!("http://{}/health", handle.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "up");

    handle.stop().await;
}
