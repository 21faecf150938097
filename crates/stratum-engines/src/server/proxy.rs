//! Shared proxy forwarding
//!
//! Both server engines capture requests under a registered prefix and hand
//! them here; the upstream call is engine-independent. Upstream failures map
//! to a 502-style internal error with the cause preserved.

use reqwest::Client;
use serde_json::Value;

use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::{PortRequest, PortResponse, ProxyConfig};

// Hop-by-hop headers never forwarded upstream.
const SKIPPED_HEADERS: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// Forward a captured request to the configured upstream
pub(crate) async fn forward(
    client: &Client,
    config: &ProxyConfig,
    request: &PortRequest,
) -> Result<PortResponse> {
    let tail = request
        .path
        .strip_prefix(&config.prefix)
        .unwrap_or("")
        .trim_start_matches('/');
    let url = if tail.is_empty() {
        config.upstream.trim_end_matches('/').to_string()
    } else {
        format!("{}/{}", config.upstream.trim_end_matches('/'), tail)
    };

    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| Error::bad_request(format!("unsupported proxy method: {e}")))?;

    let mut builder = client.request(method, &url);
    if !request.query.is_empty() {
        builder = builder.query(&request.query);
    }
    for (name, value) in &request.headers {
        if !SKIPPED_HEADERS.contains(&name.as_str()) {
            builder = builder.header(name, value);
        }
    }
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }

    let upstream = builder.send().await.map_err(|e| {
        Error::internal(format!("proxy upstream request failed: {e}"))
            .with_reason("bad-gateway")
            .with_source(e)
            .with_component("proxy")
            .with_operation("forward")
    })?;

    let status = upstream.status().as_u16();
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = if content_type.as_deref().is_some_and(|ct| ct.contains("json")) {
        upstream.json::<Value>().await.ok()
    } else {
        match upstream.text().await {
            Ok(text) if !text.is_empty() => Some(Value::String(text)),
            _ => None,
        }
    };

    let mut response = PortResponse {
        status,
        headers: Default::default(),
        body,
    };
    if let Some(content_type) = content_type {
        response = response.with_header("content-type", content_type);
    }
    Ok(response)
}
