use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Error types for upstream API operations
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unauthorized - the configured auth token was rejected")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateLimited,
}

/// Per-request timeout applied to every outbound call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to the upstream API: base URL, bearer auth as default
/// headers, fixed request timeout. Tool calls share one instance.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    /// Create a client for the given base URL with the given default headers.
    pub fn new(base_url: &str, default_headers: HeaderMap) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|source| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Execute a request against `base_url` + `path` and decode the response.
    ///
    /// Paths are appended to the base URL as-is, so a base of
    /// `https://api.example.com/v1` keeps its `/v1` prefix.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        headers: HeaderMap,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path);
        debug!(%method, url, "sending API request");

        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if !headers.is_empty() {
            request = request.headers(headers);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(Value::Null),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited),
            status if status.is_success() => {
                let text = response.text().await?;
                if text.is_empty() {
                    return Ok(Value::Null);
                }
                // non-JSON success bodies are passed through as text
                Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
            }
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(ApiError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }
}
