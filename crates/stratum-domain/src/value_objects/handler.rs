//! Handler descriptors and route schemas
//!
//! Routes and hooks are declared through these values; the engine adapters
//! read them and translate to their native registration calls. Schema
//! validation is manual and engine-independent: it runs over the normalized
//! request before the handler executes, and its failures are forwarded to
//! the engine's native error channel.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::{HttpMethod, PortRequest};

/// Lifecycle points hooks can attach to
///
/// The vocabulary is fixed; an engine that cannot express a point refuses
/// the hook with a warning instead of silently dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookPoint {
    /// Request accepted by the engine, before anything else
    RequestReceived,
    /// After validation, immediately before the handler
    PreHandler,
    /// After the handler produced a response
    OnResponse,
    /// Handler or validation failed
    OnError,
}

impl HookPoint {
    /// Kebab-case wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestReceived => "request-received",
            Self::PreHandler => "pre-handler",
            Self::OnResponse => "on-response",
            Self::OnError => "on-error",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route registration descriptor
///
/// `url` uses `:param` segments; adapters translate to their native syntax.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    /// Path template, `:param` style
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Optional request schema, validated before the handler runs
    pub schema: Option<RouteSchema>,
}

impl RouteDescriptor {
    /// Create a descriptor without a schema
    pub fn new<S: Into<String>>(method: HttpMethod, url: S) -> Self {
        Self {
            url: url.into(),
            method,
            schema: None,
        }
    }

    /// Attach a request schema
    pub fn with_schema(mut self, schema: RouteSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Expected JSON type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    // Query and path parameters arrive as strings; check the lexical form.
    fn matches_text(self, value: &str) -> bool {
        match self {
            Self::String => true,
            Self::Number => value.parse::<f64>().is_ok(),
            Self::Boolean => matches!(value, "true" | "false"),
            Self::Object | Self::Array => false,
        }
    }
}

/// Declared shape of one request section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Fields that must be present
    #[serde(default)]
    pub required: Vec<String>,
    /// Per-field expected types
    #[serde(default)]
    pub fields: std::collections::HashMap<String, FieldKind>,
}

impl ObjectSchema {
    /// Declare a required field with its type
    pub fn require<S: Into<String>>(mut self, name: S, kind: FieldKind) -> Self {
        let name = name.into();
        self.fields.insert(name.clone(), kind);
        self.required.push(name);
        self
    }

    /// Declare an optional field with its type
    pub fn optional<S: Into<String>>(mut self, name: S, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }
}

/// Manual request schema for a route
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSchema {
    /// JSON body shape
    pub body: Option<ObjectSchema>,
    /// Query parameter shape
    pub query: Option<ObjectSchema>,
    /// Path parameter shape
    pub params: Option<ObjectSchema>,
}

impl RouteSchema {
    /// Schema validating only the body
    pub fn body(schema: ObjectSchema) -> Self {
        Self {
            body: Some(schema),
            ..Self::default()
        }
    }

    /// Attach a query schema
    pub fn with_query(mut self, schema: ObjectSchema) -> Self {
        self.query = Some(schema);
        self
    }

    /// Attach a params schema
    pub fn with_params(mut self, schema: ObjectSchema) -> Self {
        self.params = Some(schema);
        self
    }

    /// Validate a normalized request against this schema
    ///
    /// Returns the full list of violations rather than stopping at the
    /// first, so callers can surface everything at once.
    pub fn validate(&self, request: &PortRequest) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        if let Some(schema) = &self.body {
            match &request.body {
                Some(Value::Object(map)) => {
                    for name in &schema.required {
                        if !map.contains_key(name) {
                            violations.push(format!("body.{name} is required"));
                        }
                    }
                    for (name, kind) in &schema.fields {
                        if let Some(value) = map.get(name) {
                            if !kind.matches(value) {
                                violations.push(format!("body.{name} must be a {kind:?}"));
                            }
                        }
                    }
                }
                Some(_) => violations.push("body must be a JSON object".to_string()),
                None => {
                    if !schema.required.is_empty() {
                        violations.push("body is required".to_string());
                    }
                }
            }
        }

        if let Some(schema) = &self.query {
            validate_text_section("query", schema, &request.query, &mut violations);
        }
        if let Some(schema) = &self.params {
            validate_text_section("params", schema, &request.params, &mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn validate_text_section(
    section: &str,
    schema: &ObjectSchema,
    values: &std::collections::HashMap<String, String>,
    violations: &mut Vec<String>,
) {
    for name in &schema.required {
        if !values.contains_key(name) {
            violations.push(format!("{section}.{name} is required"));
        }
    }
    for (name, kind) in &schema.fields {
        if let Some(value) = values.get(name) {
            if !kind.matches_text(value) {
                violations.push(format!("{section}.{name} must be a {kind:?}"));
            }
        }
    }
}

/// Reverse proxy registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Path prefix to capture
    pub prefix: String,
    /// Upstream base URL
    pub upstream: String,
}

/// Static file mount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    /// Mount path (e.g. `/assets`)
    pub mount: String,
    /// Directory served from
    pub dir: PathBuf,
}

/// SPA fallback registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaFallbackConfig {
    /// Reserved API prefix; unmatched requests under it 404
    pub api_prefix: String,
    /// Directory containing the entry document
    pub static_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> RouteSchema {
        RouteSchema::body(
            ObjectSchema::default()
                .require("name", FieldKind::String)
                .optional("count", FieldKind::Number),
        )
        .with_query(ObjectSchema::default().optional("limit", FieldKind::Number))
    }

    #[test]
    fn accepts_valid_request() {
        let req = PortRequest::new(HttpMethod::Post, "/things")
            .with_body(json!({"name": "a", "count": 2}))
            .with_query("limit", "10");
        assert!(schema().validate(&req).is_ok());
    }

    #[test]
    fn collects_all_violations() {
        let req = PortRequest::new(HttpMethod::Post, "/things")
            .with_body(json!({"count": "two"}))
            .with_query("limit", "lots");
        let violations = schema().validate(&req).unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().any(|v| v.contains("body.name")));
        assert!(violations.iter().any(|v| v.contains("body.count")));
        assert!(violations.iter().any(|v| v.contains("query.limit")));
    }

    #[test]
    fn missing_body_fails_when_fields_required() {
        let req = PortRequest::new(HttpMethod::Post, "/things");
        let violations = schema().validate(&req).unwrap_err();
        assert_eq!(violations, vec!["body is required".to_string()]);
    }

    #[test]
    fn non_object_body_is_rejected() {
        let req = PortRequest::new(HttpMethod::Post, "/things").with_body(json!([1, 2]));
        let violations = schema().validate(&req).unwrap_err();
        assert!(violations[0].contains("JSON object"));
    }
}
