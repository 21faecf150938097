//! Normalized request/response values
//!
//! Engine adapters translate their native request and reply shapes into
//! these types at the port boundary; handlers and hooks never see an
//! engine-specific type. The commit slot on [`PortRequest`] enforces the
//! single-response rule: whoever commits first wins, and the platform
//! adapter never sends a second response for the same request.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

/// HTTP method at the port boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Uppercase wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(Error::bad_request(format!("Unsupported HTTP method: {other}"))),
        }
    }
}

/// Normalized response value produced by handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Optional JSON body
    pub body: Option<Value>,
}

impl PortResponse {
    /// Response with the given status and no body
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// 200 response with a JSON body
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// Response with the given status and JSON body
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Some(body),
        }
    }

    /// 204 response
    pub fn no_content() -> Self {
        Self::status(204)
    }

    /// Add a response header
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Normalized request value handed to hooks and handlers
///
/// Cloning is cheap and shares the commit slot, so a clone handed to a
/// handler still observes (and participates in) the single-response rule.
#[derive(Debug, Clone)]
pub struct PortRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Request path, without query string
    pub path: String,
    /// Path parameters extracted by the engine
    pub params: HashMap<String, String>,
    /// Query parameters
    pub query: HashMap<String, String>,
    /// Request headers, lowercase keys
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, if any
    pub body: Option<Value>,
    /// Scratch space for hooks (auth context and the like)
    pub context: HashMap<String, Value>,
    /// Correlation id, taken from the request header or generated
    pub correlation_id: String,
    committed: Arc<Mutex<Option<PortResponse>>>,
}

impl PortRequest {
    /// Create a request with the given method and path
    pub fn new<S: Into<String>>(method: HttpMethod, path: S) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: None,
            context: HashMap::new(),
            correlation_id: Uuid::new_v4().to_string(),
            committed: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the parsed body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a path parameter
    pub fn with_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set a query parameter
    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set a header (key lowercased)
    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Commit a response for this request
    ///
    /// The first commit wins; returns `false` when a response was already
    /// committed, in which case the argument is dropped.
    pub fn commit(&self, response: PortResponse) -> bool {
        let mut slot = self.committed.lock().expect("commit slot poisoned");
        if slot.is_some() {
            return false;
        }
        *slot = Some(response);
        true
    }

    /// Whether a response has been committed
    pub fn is_committed(&self) -> bool {
        self.committed.lock().expect("commit slot poisoned").is_some()
    }

    /// Take the committed response, leaving the slot occupied
    ///
    /// Returns a clone so late commit attempts still observe the slot as
    /// taken and are refused.
    pub fn committed_response(&self) -> Option<PortResponse> {
        self.committed.lock().expect("commit slot poisoned").clone()
    }
}
