//! [`DocumentStoreClient`] over the official `elasticsearch` crate.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::Elasticsearch;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::headers::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

use super::{DocumentStoreClient, Method, RequestBody, StoreRequest, StoreResponse};

/// Authentication for the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_nodes() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_request_timeout_ms() -> u64 {
    30000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
        }
    }
}

/// Sends store requests through an [`Elasticsearch`] client.
pub struct ElasticsearchClient {
    client: Elasticsearch,
    config: ClientConfig,
}

impl Debug for ElasticsearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchClient")
            .field("nodes", &self.config.nodes)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchClient {
    /// Connects using the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: Elasticsearch) -> Self {
        Self {
            client,
            config: ClientConfig::default(),
        }
    }

    fn build_client(config: &ClientConfig) -> Result<Elasticsearch, TransportError> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let parsed_url: elasticsearch::http::Url = url
            .parse()
            .map_err(|e| TransportError::with_source(format!("invalid node URL '{}'", url), e))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder =
            TransportBuilder::new(conn_pool).timeout(Duration::from_millis(config.request_timeout_ms));

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(ref auth) = config.auth {
            builder = match auth {
                ElasticsearchAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticsearchAuth::Bearer { token } => builder.auth(Credentials::Bearer(token.clone())),
            };
        }

        let transport = builder
            .build()
            .map_err(|e| TransportError::with_source("failed to build transport", e))?;

        Ok(Elasticsearch::new(transport))
    }

    /// The connection settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn method(method: Method) -> elasticsearch::http::Method {
    match method {
        Method::Get => elasticsearch::http::Method::Get,
        Method::Put => elasticsearch::http::Method::Put,
        Method::Post => elasticsearch::http::Method::Post,
        Method::Delete => elasticsearch::http::Method::Delete,
        Method::Head => elasticsearch::http::Method::Head,
    }
}

fn headers(request: &StoreRequest) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    if matches!(request.body, Some(RequestBody::NdJson(_))) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"));
    }
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::with_source(format!("invalid header name '{}'", name), e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::with_source(format!("invalid value for header '{}'", name), e))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[async_trait]
impl DocumentStoreClient for ElasticsearchClient {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse, TransportError> {
        let headers = headers(&request)?;
        let query = if request.params.is_empty() {
            None
        } else {
            Some(&request.params)
        };
        let body = request.body.as_ref().map(RequestBody::to_text);

        let response = self
            .client
            .send(method(request.method), &request.path, headers, query, body, None)
            .await
            .map_err(|e| TransportError::with_source(format!("{} request failed", request.operation), e))?;

        let status = response.status_code().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::with_source(format!("failed to read {} response", request.operation), e))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(StoreResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.nodes, vec!["http://localhost:9200"]);
        assert_eq!(config.request_timeout_ms, 30000);
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_invalid_url() {
        let config = ClientConfig {
            nodes: vec!["not a url".to_string()],
            ..Default::default()
        };
        assert!(ElasticsearchClient::new(config).is_err());
    }

    #[test]
    fn test_ndjson_header() {
        let request = StoreRequest::new("bulk", Method::Post, "/_bulk")
            .ndjson(vec![serde_json::json!({"delete": {"_id": "1"}})])
            .header("x-opaque-id", "abc");
        let headers = headers(&request).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/x-ndjson");
        assert_eq!(headers.get("x-opaque-id").unwrap(), "abc");
    }
}
