//! Schema-to-tool catalog.
//!
//! Walks the `paths` object of an OpenAPI document and derives one MCP tool
//! per operation. Parameter schemas are passed through verbatim; `$ref`s are
//! not resolved and no validation is performed beyond the shapes this module
//! needs to read. Entries it cannot interpret are skipped with a warning.

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use rmcp::model::{JsonObject, Tool};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

const METHODS: [&str; 5] = ["get", "put", "post", "delete", "patch"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("OpenAPI schema must be a JSON object")]
    SchemaNotObject,
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("parameter '{0}' does not fit in an HTTP header")]
    InvalidHeader(String),
}

/// Where a tool argument ends up in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamLocation {
    Path,
    Query,
    Header,
    /// One field of a JSON object body.
    BodyField,
    /// The entire request body.
    Payload,
}

#[derive(Debug, Clone)]
struct ToolParam {
    name: String,
    location: ParamLocation,
    required: bool,
}

/// A tool derived from one OpenAPI operation.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    method: Method,
    path: String,
    params: Vec<ToolParam>,
    input_schema: Arc<JsonObject>,
}

/// An outbound request assembled from tool-call arguments.
#[derive(Debug)]
pub struct BoundRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// All tools discovered in a schema document.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    /// Derive the catalog from an OpenAPI document.
    ///
    /// An absent or empty `paths` object yields an empty catalog. A `paths`
    /// value of the wrong shape is treated the same way, with a warning --
    /// the document already passed the well-formedness check at load time.
    pub fn from_schema(schema: &Value) -> Result<Self, CatalogError> {
        let root = schema.as_object().ok_or(CatalogError::SchemaNotObject)?;

        let paths = match root.get("paths") {
            Some(Value::Object(paths)) => paths,
            Some(_) => {
                warn!("'paths' is not a JSON object; no tools generated");
                return Ok(Self::default());
            }
            None => return Ok(Self::default()),
        };

        let mut tools = Vec::new();
        let mut names: HashSet<String> = HashSet::new();

        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                warn!("skipping path '{path}': not a JSON object");
                continue;
            };
            let shared_params = item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for method in METHODS {
                let Some(operation) = item.get(method) else {
                    continue;
                };
                let Some(operation) = operation.as_object() else {
                    warn!(
                        "skipping {} {path}: operation is not a JSON object",
                        method.to_uppercase()
                    );
                    continue;
                };
                tools.push(ToolSpec::from_operation(
                    method,
                    path,
                    operation,
                    &shared_params,
                    &mut names,
                ));
            }
        }

        Ok(Self { tools })
    }

    /// MCP tool definitions for `tools/list`.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolSpec::to_tool).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolSpec {
    fn from_operation(
        method: &str,
        path: &str,
        operation: &Map<String, Value>,
        shared_params: &[Value],
        taken_names: &mut HashSet<String>,
    ) -> Self {
        let name = unique_name(
            operation
                .get("operationId")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(sanitize_name)
                .unwrap_or_else(|| default_tool_name(method, path)),
            taken_names,
        );

        let description = operation
            .get("summary")
            .or_else(|| operation.get("description"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {} {path}", method.to_uppercase()));

        let mut params = Vec::new();
        let mut properties = Map::new();
        let mut required = Vec::new();

        let own_params = operation
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for entry in shared_params.iter().chain(own_params.iter()) {
            collect_parameter(entry, &mut params, &mut properties, &mut required);
        }

        collect_request_body(operation, &mut params, &mut properties, &mut required);

        let mut input_schema = Map::new();
        input_schema.insert("type".to_string(), json!("object"));
        input_schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            input_schema.insert("required".to_string(), Value::Array(required));
        }

        Self {
            name,
            description,
            method: http_method(method),
            path: path.to_string(),
            params,
            input_schema: Arc::new(input_schema),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn input_schema(&self) -> &JsonObject {
        &self.input_schema
    }

    fn to_tool(&self) -> Tool {
        Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::clone(&self.input_schema),
        )
    }

    /// Distribute tool-call arguments over the request template.
    pub fn bind(&self, args: &JsonObject) -> Result<BoundRequest, BindError> {
        let mut path = self.path.clone();
        let mut query = Vec::new();
        let mut headers = HeaderMap::new();
        let mut body_fields = Map::new();
        let mut payload = None;

        for param in &self.params {
            let Some(value) = args.get(&param.name).filter(|v| !v.is_null()) else {
                if param.required {
                    return Err(BindError::MissingParameter(param.name.clone()));
                }
                continue;
            };

            match param.location {
                ParamLocation::Path => {
                    path = path.replace(&format!("{{{}}}", param.name), &scalar_string(value));
                }
                ParamLocation::Query => {
                    query.push((param.name.clone(), query_string(value)));
                }
                ParamLocation::Header => {
                    let name = HeaderName::from_bytes(param.name.as_bytes())
                        .map_err(|_| BindError::InvalidHeader(param.name.clone()))?;
                    let header_value = HeaderValue::from_str(&scalar_string(value))
                        .map_err(|_| BindError::InvalidHeader(param.name.clone()))?;
                    headers.insert(name, header_value);
                }
                ParamLocation::BodyField => {
                    body_fields.insert(param.name.clone(), value.clone());
                }
                ParamLocation::Payload => {
                    payload = Some(value.clone());
                }
            }
        }

        let body = match payload {
            Some(payload) => Some(payload),
            None if !body_fields.is_empty() => Some(Value::Object(body_fields)),
            None => None,
        };

        Ok(BoundRequest {
            method: self.method.clone(),
            path,
            query,
            headers,
            body,
        })
    }
}

/// Read one entry of a `parameters` array into the tool definition.
fn collect_parameter(
    entry: &Value,
    params: &mut Vec<ToolParam>,
    properties: &mut Map<String, Value>,
    required: &mut Vec<Value>,
) {
    let Some(entry) = entry.as_object() else {
        warn!("skipping parameter: not a JSON object");
        return;
    };
    let Some(name) = entry.get("name").and_then(Value::as_str) else {
        warn!("skipping parameter without a name");
        return;
    };
    let location = match entry.get("in").and_then(Value::as_str) {
        Some("path") => ParamLocation::Path,
        Some("query") => ParamLocation::Query,
        Some("header") => ParamLocation::Header,
        other => {
            warn!("skipping parameter '{name}': unsupported location {other:?}");
            return;
        }
    };
    if properties.contains_key(name) {
        warn!("skipping duplicate parameter '{name}'");
        return;
    }

    // path parameters are always required in OpenAPI
    let is_required = entry
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(location == ParamLocation::Path);

    let mut schema = entry
        .get("schema")
        .cloned()
        .unwrap_or_else(|| json!({"type": "string"}));
    if let (Some(schema), Some(description)) = (
        schema.as_object_mut(),
        entry.get("description").and_then(Value::as_str),
    ) {
        schema
            .entry("description".to_string())
            .or_insert_with(|| json!(description));
    }

    properties.insert(name.to_string(), schema);
    if is_required {
        required.push(json!(name));
    }
    params.push(ToolParam {
        name: name.to_string(),
        location,
        required: is_required,
    });
}

/// Fold a JSON request body into the tool definition: an inline object schema
/// contributes its properties as individual arguments, anything else becomes
/// a single `body` argument taking the whole payload.
fn collect_request_body(
    operation: &Map<String, Value>,
    params: &mut Vec<ToolParam>,
    properties: &mut Map<String, Value>,
    required: &mut Vec<Value>,
) {
    let Some(request_body) = operation.get("requestBody") else {
        return;
    };
    let Some(schema) = request_body
        .pointer("/content/application~1json/schema")
        .cloned()
    else {
        warn!("request body has no application/json content; ignoring it");
        return;
    };

    let body_required = request_body
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if let Some(body_properties) = schema.get("properties").and_then(Value::as_object) {
        let required_fields: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (field, field_schema) in body_properties {
            if properties.contains_key(field) {
                warn!("skipping body field '{field}': name already taken by a parameter");
                continue;
            }
            let is_required = body_required && required_fields.contains(field.as_str());
            properties.insert(field.clone(), field_schema.clone());
            if is_required {
                required.push(json!(field));
            }
            params.push(ToolParam {
                name: field.clone(),
                location: ParamLocation::BodyField,
                required: is_required,
            });
        }
        return;
    }

    if properties.contains_key("body") {
        warn!("skipping request body: 'body' argument name already taken");
        return;
    }
    properties.insert("body".to_string(), schema);
    if body_required {
        required.push(json!("body"));
    }
    params.push(ToolParam {
        name: "body".to_string(),
        location: ParamLocation::Payload,
        required: body_required,
    });
}

fn http_method(name: &str) -> Method {
    match name {
        "get" => Method::GET,
        "put" => Method::PUT,
        "post" => Method::POST,
        "delete" => Method::DELETE,
        _ => Method::PATCH,
    }
}

fn default_tool_name(method: &str, path: &str) -> String {
    sanitize_name(&format!("{method}_{}", path.trim_start_matches('/')))
}

fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn unique_name(candidate: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(candidate.clone()) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let suffixed = format!("{candidate}_{n}");
        if taken.insert(suffixed.clone()) {
            return suffixed;
        }
        n += 1;
    }
}

/// Stringify a scalar argument for use in a path segment or header.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Stringify a query argument; arrays are comma-joined.
fn query_string(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_string)
            .collect::<Vec<_>>()
            .join(","),
        other => scalar_string(other),
    }
}
