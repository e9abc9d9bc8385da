//! The document-store client boundary.
//!
//! The core describes each call as a [`StoreRequest`] and expects a
//! [`StoreResponse`] back. Wire framing, connection pooling, timeouts and
//! cancellation belong to the [`DocumentStoreClient`] implementation; transport
//! failures come back as [`TransportError`] and are passed through untouched.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Debug)]
//! struct Recording(Mutex<Vec<StoreRequest>>);
//!
//! #[async_trait]
//! impl DocumentStoreClient for Recording {
//!     async fn execute(&self, request: StoreRequest) -> Result<StoreResponse, TransportError> {
//!         self.0.lock().push(request);
//!         Ok(StoreResponse::new(200, json!({"acknowledged": true})))
//!     }
//! }
//! ```

#[cfg(feature = "elasticsearch")]
mod elasticsearch;

#[cfg(feature = "elasticsearch")]
pub use self::elasticsearch::{ClientConfig, ElasticsearchAuth, ElasticsearchClient};

use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

/// HTTP-style request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Create or replace.
    Put,
    /// Submit.
    Post,
    /// Remove.
    Delete,
    /// Existence check.
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// One JSON document.
    Json(Value),
    /// Newline-delimited JSON, one value per line (bulk requests).
    NdJson(Vec<Value>),
}

impl RequestBody {
    /// The body as text.
    pub fn to_text(&self) -> String {
        match self {
            RequestBody::Json(value) => value.to_string(),
            RequestBody::NdJson(lines) => {
                let mut out = String::new();
                for line in lines {
                    out.push_str(&line.to_string());
                    out.push('\n');
                }
                out
            }
        }
    }
}

/// One call to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    /// Short operation name used in logs and errors (`index`, `search`, ...).
    pub operation: &'static str,
    /// Request method.
    pub method: Method,
    /// Path below the node URL, starting with `/`.
    pub path: String,
    /// Query-string parameters such as `routing`, `version` or `refresh`.
    pub params: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Target index, when the request has one.
    pub index: Option<String>,
    /// Request body.
    pub body: Option<RequestBody>,
}

impl StoreRequest {
    /// Creates a request without parameters or body.
    pub fn new(operation: &'static str, method: Method, path: impl Into<String>) -> Self {
        Self {
            operation,
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
            index: None,
            body: None,
        }
    }

    /// Adds a query-string parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Adds a query-string parameter when `value` is present.
    pub fn param_opt(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Records the target index.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Sets a newline-delimited JSON body.
    pub fn ndjson(mut self, lines: Vec<Value>) -> Self {
        self.body = Some(RequestBody::NdJson(lines));
        self
    }

    /// Looks up a parameter.
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// The JSON body, if the body is a single document.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }
}

/// The store's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed body; `Null` for empty bodies such as HEAD responses.
    pub body: Value,
}

impl StoreResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for 404.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Returns true for 409.
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

/// Executes store requests.
///
/// Implementations own timeouts and cancellation. Dropping the returned future
/// cancels the call as far as the implementation supports it.
#[async_trait]
pub trait DocumentStoreClient: Send + Sync + Debug {
    /// Sends one request.
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse, TransportError>;
}

#[async_trait]
impl<C: DocumentStoreClient + ?Sized> DocumentStoreClient for Arc<C> {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// Adjusts every request before it is sent, for example to add headers.
///
/// Customizers run inline on the calling task. They must not block: no I/O, no
/// waiting on locks held across awaits.
pub trait RequestCustomizer: Send + Sync {
    /// Modifies the request in place.
    fn customize(&self, request: &mut StoreRequest);
}

impl<F> RequestCustomizer for F
where
    F: Fn(&mut StoreRequest) + Send + Sync,
{
    fn customize(&self, request: &mut StoreRequest) {
        self(request)
    }
}

/// Percent-encodes a path segment such as a document id.
pub(crate) fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = StoreRequest::new("index", Method::Put, "/books/_doc/1")
            .index("books")
            .param("refresh", "wait_for")
            .param_opt("routing", Some("p1"))
            .param_opt("version", None::<i64>)
            .json(json!({"name": "Foo"}));

        assert_eq!(request.get_param("refresh"), Some("wait_for"));
        assert_eq!(request.get_param("routing"), Some("p1"));
        assert_eq!(request.get_param("version"), None);
        assert_eq!(request.json_body(), Some(&json!({"name": "Foo"})));
        assert_eq!(request.method.to_string(), "PUT");
    }

    #[test]
    fn test_ndjson_text() {
        let body = RequestBody::NdJson(vec![json!({"index": {"_id": "1"}}), json!({"a": 1})]);
        assert_eq!(body.to_text(), "{\"index\":{\"_id\":\"1\"}}\n{\"a\":1}\n");
    }

    #[test]
    fn test_closure_customizer() {
        let customizer = |request: &mut StoreRequest| request.headers.push(("x-tenant".into(), "t1".into()));
        let mut request = StoreRequest::new("get", Method::Get, "/books/_doc/1");
        customizer.customize(&mut request);
        assert_eq!(request.headers, vec![("x-tenant".to_string(), "t1".to_string())]);
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_segment("book-1_x.y"), "book-1_x.y");
    }
}
