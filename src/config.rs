use std::env;
use std::fs;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Bearer credential for outbound API calls.
pub const AUTH_TOKEN_VAR: &str = "AUTH_TOKEN";
/// File path to the OpenAPI document. Takes precedence over the inline variant.
pub const SCHEMA_PATH_VAR: &str = "OPENAPI_SCHEMA_PATH";
/// Inline OpenAPI JSON text, for deployments that cannot mount files.
pub const SCHEMA_INLINE_VAR: &str = "OPENAPI_SCHEMA";
/// Base URL the generated tools call against.
pub const BASE_URL_VAR: &str = "API_BASE_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),

    #[error("auth token is not a valid header value: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    #[error("neither OPENAPI_SCHEMA_PATH nor OPENAPI_SCHEMA environment variable is set")]
    SchemaSourceMissing,

    #[error("failed to read OpenAPI schema file {path}: {source}")]
    SchemaFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI schema: {0}")]
    SchemaParse(#[from] serde_json::Error),

    #[error("OpenAPI schema must be a JSON object")]
    SchemaNotObject,
}

/// Everything resolved from the environment at startup. Built once, never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Default request headers, containing the bearer Authorization header.
    pub auth_headers: HeaderMap,

    /// The OpenAPI document (top-level JSON object, otherwise uninterpreted).
    pub schema: Value,

    /// Upstream base URL, as provided (no URL-shape validation here).
    pub base_url: String,
}

impl RuntimeConfig {
    /// Resolve the full configuration, failing on the first missing or
    /// malformed value. The caller decides what a failure means; the
    /// accessors themselves never exit the process.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_headers = auth_headers()?;
        debug!("auth headers configured");

        let schema = load_openapi_schema()?;
        debug!("OpenAPI schema loaded");

        let base_url = base_url()?;
        debug!("base URL configured");

        Ok(Self {
            auth_headers,
            schema,
            base_url,
        })
    }
}

/// Wrap a bearer token as the Authorization header map sent on every call.
pub fn bearer_headers(token: &str) -> Result<HeaderMap, ConfigError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Read `AUTH_TOKEN` and wrap it as default request headers.
pub fn auth_headers() -> Result<HeaderMap, ConfigError> {
    let token = env_nonempty(AUTH_TOKEN_VAR).ok_or(ConfigError::MissingVar(AUTH_TOKEN_VAR))?;
    debug!(
        "auth token found: {}...",
        token.chars().take(5).collect::<String>()
    );
    bearer_headers(&token)
}

/// Load the OpenAPI document from `OPENAPI_SCHEMA_PATH` (a file) or
/// `OPENAPI_SCHEMA` (inline JSON). The file path wins when both are set.
pub fn load_openapi_schema() -> Result<Value, ConfigError> {
    let text = if let Some(path) = env_nonempty(SCHEMA_PATH_VAR) {
        debug!("loading OpenAPI schema from {path}");
        fs::read_to_string(&path)
            .map_err(|source| ConfigError::SchemaFileUnreadable { path, source })?
    } else if let Some(inline) = env_nonempty(SCHEMA_INLINE_VAR) {
        debug!("loading inline OpenAPI schema ({} bytes)", inline.len());
        inline
    } else {
        return Err(ConfigError::SchemaSourceMissing);
    };

    let schema: Value = serde_json::from_str(&text)?;
    if !schema.is_object() {
        return Err(ConfigError::SchemaNotObject);
    }
    Ok(schema)
}

/// Read `API_BASE_URL`, returned verbatim.
pub fn base_url() -> Result<String, ConfigError> {
    let url = env_nonempty(BASE_URL_VAR).ok_or(ConfigError::MissingVar(BASE_URL_VAR))?;
    debug!("using API base URL: {url}");
    Ok(url)
}

/// A variable that is unset, empty, or whitespace-only counts as missing.
fn env_nonempty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
