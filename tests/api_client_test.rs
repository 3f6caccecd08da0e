//! Integration tests for the upstream API client
//!
//! Exercises status mapping, default-header propagation, and the full
//! schema -> catalog -> bind -> request flow against a mock server.

use openapi_mcp_server::config::bearer_headers;
use openapi_mcp_server::{ApiClient, ApiError, ToolCatalog};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), bearer_headers("test-token").unwrap()).unwrap()
}

#[tokio::test]
async fn test_default_auth_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let response = client
        .request(Method::GET, "/things", &[], HeaderMap::new(), None)
        .await
        .unwrap();
    assert_eq!(response, json!({"ok": true}));
}

#[tokio::test]
async fn test_no_content_maps_to_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/things/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let response = client
        .request(Method::DELETE, "/things/1", &[], HeaderMap::new(), None)
        .await
        .unwrap();
    assert_eq!(response, serde_json::Value::Null);
}

#[tokio::test]
async fn test_unauthorized_maps_to_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let err = client
        .request(Method::GET, "/secret", &[], HeaderMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn test_rate_limit_maps_to_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let err = client
        .request(Method::GET, "/busy", &[], HeaderMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::RateLimited));
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let err = client
        .request(Method::GET, "/broken", &[], HeaderMap::new(), None)
        .await
        .unwrap_err();
    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected ApiError::Api, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_success_body_is_wrapped_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let response = client
        .request(Method::GET, "/plain", &[], HeaderMap::new(), None)
        .await
        .unwrap();
    assert_eq!(response, json!("hello"));
}

#[tokio::test]
async fn test_bound_tool_call_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/boards/b-1/notes"))
        .and(query_param("notify", "true"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_json(json!({"text": "hello"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "n-9"})))
        .expect(1)
        .mount(&server)
        .await;

    let schema = json!({
        "openapi": "3.0.0",
        "paths": {
            "/boards/{board_id}/notes": {
                "post": {
                    "operationId": "createNote",
                    "parameters": [
                        {"name": "board_id", "in": "path", "schema": {"type": "string"}},
                        {"name": "notify", "in": "query", "schema": {"type": "boolean"}}
                    ],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {"text": {"type": "string"}},
                                    "required": ["text"]
                                }
                            }
                        }
                    }
                }
            }
        }
    });
    let catalog = ToolCatalog::from_schema(&schema).unwrap();
    let spec = catalog.get("createNote").unwrap();

    let args = json!({"board_id": "b-1", "notify": true, "text": "hello"});
    let bound = spec.bind(args.as_object().unwrap()).unwrap();
    assert_eq!(bound.path, "/boards/b-1/notes");

    let client = mock_client(&server).await;
    let response = client
        .request(
            bound.method,
            &bound.path,
            &bound.query,
            bound.headers,
            bound.body,
        )
        .await
        .unwrap();
    assert_eq!(response, json!({"id": "n-9"}));
}
