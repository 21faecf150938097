//! Error handling types
//!
//! One error type crosses every boundary in the runtime. Each failure is
//! wrapped exactly once at the point it is detected, keeping the original
//! cause in `source`, and carries enough context (component, operation,
//! metadata, correlation id) to be reported without further lookup.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy
///
/// The first six kinds are startup/composition failures; the rest are
/// handler-level kinds that map onto HTTP response families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required configuration for the declared service type is missing
    Configuration,
    /// A token was resolved before anything was registered under it
    DependencyNotRegistered,
    /// An engine adapter could not be selected or its backend is unavailable
    AdapterLoad,
    /// A route or hook could not bind to the target engine
    HandlerRegistration,
    /// Database handshake or authentication failed
    DatabaseConnection,
    /// A layer resolved fewer constructors than it declared
    LayerResolution,
    /// Malformed request input
    BadRequest,
    /// Missing or invalid credentials
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,
    /// Resource does not exist
    NotFound,
    /// Request shape failed schema validation
    Validation,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code surfaced in error bodies
    pub fn code(self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION",
            Self::DependencyNotRegistered => "DEPENDENCY_NOT_REGISTERED",
            Self::AdapterLoad => "ADAPTER_LOAD",
            Self::HandlerRegistration => "HANDLER_REGISTRATION",
            Self::DatabaseConnection => "DATABASE_CONNECTION",
            Self::LayerResolution => "LAYER_RESOLUTION",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Internal => "INTERNAL",
        }
    }

    /// HTTP status family for handler-level error mapping
    pub fn http_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Validation => 422,
            Self::Configuration
            | Self::DependencyNotRegistered
            | Self::AdapterLoad
            | Self::HandlerRegistration
            | Self::DatabaseConnection
            | Self::LayerResolution
            | Self::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Main error type for the Stratum runtime
///
/// Startup-time errors abort the kernel with a descriptive message;
/// handler-level errors map to HTTP responses via [`ErrorKind::http_status`].
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    /// Failure classification
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
    /// Optional short reason tag
    pub reason: Option<String>,
    /// Structured context (expected/resolved counts, violation lists, ...)
    pub metadata: Option<Value>,
    /// Component that detected the failure (e.g. "kernel", "registry")
    pub component: Option<String>,
    /// Operation in flight when the failure was detected
    pub operation: Option<String>,
    /// Detection time
    pub time: DateTime<Utc>,
    /// Unique error id
    pub id: Uuid,
    /// Correlation id of the request this error belongs to, if any
    pub correlation_id: Option<String>,
    /// Wrapped cause, preserved verbatim
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create an error of the given kind
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            reason: None,
            metadata: None,
            component: None,
            operation: None,
            time: Utc::now(),
            id: Uuid::new_v4(),
            correlation_id: None,
            source: None,
        }
    }

    /// HTTP status this error maps to
    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    /// JSON body surfaced to HTTP callers
    pub fn to_body(&self) -> Value {
        serde_json::json!({
            "message": self.message,
            "code": self.kind.code(),
            "reason": self.reason,
            "metadata": self.metadata,
            "time": self.time.to_rfc3339(),
            "id": self.id.to_string(),
            "correlationId": self.correlation_id,
        })
    }
}

// Composition-failure constructors
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an error for a token resolved before registration
    pub fn dependency_not_registered<S: AsRef<str>>(token: S) -> Self {
        Self::new(
            ErrorKind::DependencyNotRegistered,
            format!("Dependency '{}' is not registered", token.as_ref()),
        )
    }

    /// Create an error for a declared dependency missing at resolve time
    ///
    /// The message names both the missing token and the dependent so the
    /// failing edge of the graph is identifiable from the text alone.
    pub fn missing_dependency<S: AsRef<str>>(dependency: S, dependent: S) -> Self {
        Self::new(
            ErrorKind::DependencyNotRegistered,
            format!(
                "Dependency '{}' required by '{}' is not registered",
                dependency.as_ref(),
                dependent.as_ref()
            ),
        )
    }

    /// Create an adapter load error
    pub fn adapter_load<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::AdapterLoad, message)
    }

    /// Create a handler registration error
    pub fn handler_registration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::HandlerRegistration, message)
    }

    /// Create a database connection error
    pub fn database_connection<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::DatabaseConnection, message)
    }

    /// Create a layer resolution error carrying the declared-vs-resolved counts
    pub fn layer_resolution<S: AsRef<str>>(
        layer: S,
        operation: S,
        expected: usize,
        resolved: usize,
    ) -> Self {
        Self::new(
            ErrorKind::LayerResolution,
            format!(
                "{} layer failed {}: expected={}, resolved={}",
                layer.as_ref(),
                operation.as_ref(),
                expected,
                resolved
            ),
        )
        .with_metadata(serde_json::json!({
            "layer": layer.as_ref(),
            "operation": operation.as_ref(),
            "expected": expected,
            "resolved": resolved,
        }))
    }
}

// Handler-level constructors
impl Error {
    /// Create a bad request error
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Create an unauthorized error
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Create a forbidden error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        let resource = resource.into();
        Self::new(ErrorKind::NotFound, format!("Not found: {resource}"))
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

// Context builders
impl Error {
    /// Attach a short reason tag
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach structured metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach the wrapped cause
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Name the component that detected the failure
    pub fn with_component<S: Into<String>>(mut self, component: S) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Name the operation in flight
    pub fn with_operation<S: Into<String>>(mut self, operation: S) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attach the request correlation id
    pub fn with_correlation_id<S: Into<String>>(mut self, correlation_id: S) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code_and_message() {
        let err = Error::configuration("missing platforms.server");
        assert_eq!(err.to_string(), "CONFIGURATION: missing platforms.server");
    }

    #[test]
    fn missing_dependency_names_both_sides() {
        let err = Error::missing_dependency("RepoY", "ServiceX");
        assert!(err.message.contains("RepoY"));
        assert!(err.message.contains("ServiceX"));
        assert!(err.message.contains("not registered"));
    }

    #[test]
    fn layer_resolution_reports_counts() {
        let err = Error::layer_resolution("Application", "bootstrap", 3, 2);
        assert!(err.message.contains("expected=3"));
        assert!(err.message.contains("resolved=2"));
        let meta = err.metadata.expect("metadata");
        assert_eq!(meta["expected"], 3);
        assert_eq!(meta["resolved"], 2);
    }

    #[test]
    fn http_status_families() {
        assert_eq!(Error::bad_request("x").http_status(), 400);
        assert_eq!(Error::unauthorized("x").http_status(), 401);
        assert_eq!(Error::forbidden("x").http_status(), 403);
        assert_eq!(Error::not_found("x").http_status(), 404);
        assert_eq!(Error::validation("x").http_status(), 422);
        assert_eq!(Error::internal("x").http_status(), 500);
        assert_eq!(Error::adapter_load("x").http_status(), 500);
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::database_connection("handshake failed").with_source(io);
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("refused"));
    }

    #[test]
    fn body_shape() {
        let err = Error::not_found("/api/none").with_correlation_id("req-1");
        let body = err.to_body();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["correlationId"], "req-1");
        assert!(body["id"].as_str().is_some());
        assert!(body["time"].as_str().is_some());
    }
}
