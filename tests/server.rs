//! HTTP front end tests, driven in-process through the router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use request_dispatch::config::{parse_config, ServerConfig};
use request_dispatch::dispatch::Director;
use request_dispatch::handler::builtin::echo_controller;
use request_dispatch::http::{DispatchServer, X_REQUEST_ID};
use request_dispatch::RegistryBuilder;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

const ECHO_CONFIG: &str = r#"
[[director.rules]]
pattern = "$Controller//$Action/$ID/$OtherID"

[[director.rules]]
pattern = ""
controller = "EchoController"
"#;

fn echo_server() -> DispatchServer {
    let mut builder = RegistryBuilder::with_builtins();
    builder.register(echo_controller());
    let director = Director::from_config(builder, &parse_config(ECHO_CONFIG).unwrap()).unwrap();
    DispatchServer::new(Arc::new(director), &ServerConfig::default())
}

async fn send(server: &DispatchServer, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_root_reaches_echo_controller() {
    let server = echo_server();
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();

    let (status, headers, body) = send(&server, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(X_REQUEST_ID));

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["handler"], "EchoController");
    assert_eq!(body["data"]["method"], "GET");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let server = echo_server();
    let request = Request::builder()
        .uri("/")
        .header(X_REQUEST_ID, "trace-me")
        .body(Body::empty())
        .unwrap();

    let (_, headers, _) = send(&server, request).await;
    assert_eq!(headers.get(X_REQUEST_ID).unwrap(), "trace-me");
}

#[tokio::test]
async fn test_controller_rule_over_http() {
    let server = echo_server();
    let request = Request::builder()
        .uri("/echocontroller/params/5?debug=1")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = send(&server, request).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["params"]["Controller"], "echocontroller");
    assert_eq!(body["data"]["params"]["ID"], "5");
}

#[tokio::test]
async fn test_encoded_segments_bind_decoded() {
    let server = echo_server();
    let request = Request::builder()
        .uri("/echocontroller/params/about%20us/caf%C3%A9")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = send(&server, request).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["params"]["ID"], "about us");
    assert_eq!(body["data"]["params"]["OtherID"], "café");
}

#[tokio::test]
async fn test_undecodable_path_is_bad_request() {
    let server = echo_server();
    let request = Request::builder()
        .uri("/echocontroller/params/%FF")
        .body(Body::empty())
        .unwrap();

    let (status, _, _) = send(&server, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_method_override_is_bad_request() {
    let server = echo_server();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("_method=PATCH"))
        .unwrap();

    let (status, _, _) = send(&server, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_url_is_not_found() {
    let server = echo_server();
    let request = Request::builder()
        .uri("/missing/thing")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(&server, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
    assert_eq!(body, b"No URL rule was matched");
}

#[tokio::test]
async fn test_reloader_applies_new_rules() {
    let server = echo_server();
    let (tx, rx) = mpsc::unbounded_channel();
    let reloader = server.spawn_reloader(rx);

    let config = parse_config(
        r#"
[[director.rules]]
pattern = "missing"
redirect = "/"
"#,
    )
    .unwrap();
    tx.send(config).unwrap();
    drop(tx);
    tokio::time::timeout(Duration::from_secs(5), reloader)
        .await
        .unwrap()
        .unwrap();

    let request = Request::builder().uri("/missing").body(Body::empty()).unwrap();
    let (status, headers, _) = send(&server, request).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/");
}
