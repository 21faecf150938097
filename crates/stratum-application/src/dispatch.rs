//! Engine-agnostic request pipeline
//!
//! Both HTTP engines funnel every matched route through this pipeline, which
//! is why handler code runs unmodified on either: hooks fire at their
//! lifecycle points, the route schema is validated before the handler, and
//! the single-response rule is enforced at the end. Errors are returned to
//! the calling adapter, which forwards them to its engine's native error
//! channel; nothing is swallowed here.

use std::sync::Arc;

use tracing::{debug, warn};

use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::{HookPoint, PortRequest, PortResponse};

use crate::ports::server::{HookHandler, RouteHandler};

/// Ordered hook set plus the dispatch sequence
pub struct RequestPipeline {
    hooks: Vec<Arc<dyn HookHandler>>,
}

impl RequestPipeline {
    /// Pipeline over the hooks an engine accepted
    pub fn new(hooks: Vec<Arc<dyn HookHandler>>) -> Self {
        Self { hooks }
    }

    /// Pipeline with no hooks
    pub fn empty() -> Self {
        Self { hooks: Vec::new() }
    }

    fn at(&self, point: HookPoint) -> impl Iterator<Item = &Arc<dyn HookHandler>> {
        self.hooks.iter().filter(move |hook| hook.point() == point)
    }

    async fn run_hooks(&self, point: HookPoint, request: &mut PortRequest) -> Result<()> {
        for hook in self.at(point) {
            hook.execute(request).await?;
        }
        Ok(())
    }

    // Error hooks observe failures; their own failures must not mask the
    // original error.
    async fn run_error_hooks(&self, request: &mut PortRequest) {
        let mut request = request.clone();
        for hook in self.at(HookPoint::OnError) {
            if let Err(hook_err) = hook.execute(&mut request).await {
                warn!(point = %HookPoint::OnError, error = %hook_err, "error hook failed");
            }
        }
    }

    /// Run a normalized request through hooks, validation, and the handler
    ///
    /// The committed response always wins: a hook that commits short-circuits
    /// the handler, and a handler that both commits and returns gets its
    /// returned value dropped.
    pub async fn dispatch(
        &self,
        route: &dyn RouteHandler,
        mut request: PortRequest,
    ) -> Result<PortResponse> {
        let correlation_id = request.correlation_id.clone();

        if let Err(err) = self.run_hooks(HookPoint::RequestReceived, &mut request).await {
            self.run_error_hooks(&mut request).await;
            return Err(correlate(err, &correlation_id));
        }
        if let Some(early) = request.committed_response() {
            return Ok(early);
        }

        if let Some(schema) = &route.descriptor().schema {
            if let Err(violations) = schema.validate(&request) {
                let err = Error::validation("Request failed schema validation")
                    .with_metadata(serde_json::json!({ "violations": violations }))
                    .with_correlation_id(correlation_id);
                self.run_error_hooks(&mut request).await;
                return Err(err);
            }
        }

        if let Err(err) = self.run_hooks(HookPoint::PreHandler, &mut request).await {
            self.run_error_hooks(&mut request).await;
            return Err(correlate(err, &correlation_id));
        }
        if let Some(early) = request.committed_response() {
            return Ok(early);
        }

        match route.execute(request.clone()).await {
            Ok(returned) => {
                let response = match request.committed_response() {
                    Some(committed) => {
                        if committed != returned {
                            debug!(
                                path = %request.path,
                                "handler returned a response after committing one; keeping the committed response"
                            );
                        }
                        committed
                    }
                    None => returned,
                };
                if let Err(err) = self.run_hooks(HookPoint::OnResponse, &mut request).await {
                    self.run_error_hooks(&mut request).await;
                    return Err(correlate(err, &correlation_id));
                }
                Ok(response)
            }
            Err(err) => {
                self.run_error_hooks(&mut request).await;
                Err(correlate(err, &correlation_id))
            }
        }
    }
}

fn correlate(err: Error, correlation_id: &str) -> Error {
    if err.correlation_id.is_none() {
        err.with_correlation_id(correlation_id)
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::server::{FnHook, FnRoute};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stratum_domain::value_objects::{
        FieldKind, HttpMethod, ObjectSchema, RouteDescriptor, RouteSchema,
    };
    use stratum_domain::ErrorKind;

    fn echo_route() -> FnRoute {
        FnRoute::new(
            RouteDescriptor::new(HttpMethod::Post, "/things"),
            |request| async move { Ok(PortResponse::ok(json!({ "echo": request.body }))) },
        )
    }

    #[tokio::test]
    async fn plain_dispatch_returns_handler_response() {
        let pipeline = RequestPipeline::empty();
        let request = PortRequest::new(HttpMethod::Post, "/things").with_body(json!({"a": 1}));
        let response = pipeline.dispatch(&echo_route(), request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.unwrap()["echo"]["a"], 1);
    }

    #[tokio::test]
    async fn early_commit_short_circuits_the_handler() {
        let executed = Arc::new(AtomicUsize::new(0));
        let count = executed.clone();
        let route = FnRoute::new(
            RouteDescriptor::new(HttpMethod::Get, "/guarded"),
            move |_request| {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(PortResponse::ok(json!({"handled": true})))
                }
            },
        );
        let deny = FnHook::shared(HookPoint::RequestReceived, |request| {
            request.commit(PortResponse::json(401, json!({"message": "no token"})));
            Ok(())
        });

        let pipeline = RequestPipeline::new(vec![deny]);
        let response = pipeline
            .dispatch(&route, PortRequest::new(HttpMethod::Get, "/guarded"))
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn committed_response_beats_returned_response() {
        let route = FnRoute::new(
            RouteDescriptor::new(HttpMethod::Get, "/double"),
            |request| async move {
                request.commit(PortResponse::json(201, json!({"committed": true})));
                Ok(PortResponse::ok(json!({"returned": true})))
            },
        );

        let response = RequestPipeline::empty()
            .dispatch(&route, PortRequest::new(HttpMethod::Get, "/double"))
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.body.unwrap()["committed"], true);
    }

    #[tokio::test]
    async fn schema_violation_fails_before_the_handler() {
        let schema =
            RouteSchema::body(ObjectSchema::default().require("name", FieldKind::String));
        let route = FnRoute::new(
            RouteDescriptor::new(HttpMethod::Post, "/things").with_schema(schema),
            |_request| async move { panic!("handler must not run") },
        );

        let request = PortRequest::new(HttpMethod::Post, "/things").with_body(json!({}));
        let err = RequestPipeline::empty().dispatch(&route, request).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.correlation_id.is_some());
        let violations = &err.metadata.as_ref().unwrap()["violations"];
        assert!(violations[0].as_str().unwrap().contains("body.name"));
    }

    #[tokio::test]
    async fn hook_mutations_reach_the_handler() {
        let stamp = FnHook::shared(HookPoint::PreHandler, |request| {
            request.context.insert("user".to_string(), json!("u-1"));
            Ok(())
        });
        let route = FnRoute::new(
            RouteDescriptor::new(HttpMethod::Get, "/me"),
            |request| async move {
                Ok(PortResponse::ok(json!({ "user": request.context["user"] })))
            },
        );

        let response = RequestPipeline::new(vec![stamp])
            .dispatch(&route, PortRequest::new(HttpMethod::Get, "/me"))
            .await
            .unwrap();
        assert_eq!(response.body.unwrap()["user"], "u-1");
    }

    #[tokio::test]
    async fn error_hooks_observe_handler_failures() {
        let seen = Arc::new(AtomicUsize::new(0));
        let count = seen.clone();
        let observer = FnHook::shared(HookPoint::OnError, move |_request| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let route = FnRoute::new(
            RouteDescriptor::new(HttpMethod::Get, "/boom"),
            |_request| async move { Err(stratum_domain::Error::not_found("thing")) },
        );

        let err = RequestPipeline::new(vec![observer])
            .dispatch(&route, PortRequest::new(HttpMethod::Get, "/boom"))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
