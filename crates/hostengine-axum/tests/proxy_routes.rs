//! OpenAI-compatible routes against a stand-in engine.

mod common;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use futures_util::stream;
use serde_json::{Value, json};

use common::{closed_port, send, send_json, spawn_engine_stub, test_app, test_config};

/// Engine stub that echoes the chat request it received.
fn echo_engine() -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(|axum::Json(body): axum::Json<Value>| async move {
                axum::Json(json!({"object": "chat.completion", "received": body}))
            }),
        )
        .route(
            "/v1/models",
            get(|| async { axum::Json(json!({"object": "list", "data": [{"id": "model-a"}]})) }),
        )
}

#[tokio::test]
async fn model_list_is_proxied() {
    let port = spawn_engine_stub(echo_engine()).await;
    let app = test_app(test_config(port));

    let (status, body) = send_json(&app.router, Method::GET, "/v1/models", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], "model-a");
}

#[tokio::test]
async fn chat_request_is_forwarded_with_defaults() {
    let port = spawn_engine_stub(echo_engine()).await;
    let app = test_app(test_config(port));

    let (status, body) = send_json(
        &app.router,
        Method::POST,
        "/v1/chat/completions",
        Some(json!({
            "messages": [{"role": "user", "content": "hello"}],
            "seed": 7
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let received = &body["received"];
    assert_eq!(received["messages"][0]["content"], "hello");
    assert_eq!(received["max_tokens"], 2048);
    assert_eq!(received["temperature"], 0.7);
    assert_eq!(received["top_p"], 1.0);
    assert_eq!(received["stream"], false);
    assert_eq!(received["seed"], 7);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = test_app(test_config(closed_port().await));

    let (status, _, bytes) = send(
        &app.router,
        Method::POST,
        "/v1/chat/completions",
        Body::from("{not json"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn schema_violations_are_unprocessable() {
    let app = test_app(test_config(closed_port().await));

    for payload in [
        json!({"messages": []}),
        json!({"messages": [{"role": "robot", "content": "hi"}]}),
        json!({"messages": [{"role": "user", "content": "hi"}], "max_tokens": 9000}),
        json!({"messages": [{"role": "user", "content": "hi"}], "temperature": 3.0}),
        json!({"messages": "hi"}),
    ] {
        let (status, body) = send_json(
            &app.router,
            Method::POST,
            "/v1/chat/completions",
            Some(payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload: {payload}");
        assert_eq!(body["status"], 422);
    }
}

#[tokio::test]
async fn upstream_error_status_is_relayed() {
    let engine = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "application/json")],
                r#"{"error":"model is loading"}"#,
            )
        }),
    );
    let port = spawn_engine_stub(engine).await;
    let app = test_app(test_config(port));

    let (status, headers, bytes) = send(
        &app.router,
        Method::POST,
        "/v1/chat/completions",
        Body::from(json!({"messages": [{"role": "user", "content": "hi"}]}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(bytes, Bytes::from_static(br#"{"error":"model is loading"}"#));
}

#[tokio::test]
async fn streaming_completion_is_passed_through() {
    let engine = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            let chunks = stream::iter([
                Ok::<_, std::io::Error>(Bytes::from_static(b"data: {\"delta\":\"Hel\"}\n\n")),
                Ok(Bytes::from_static(b"data: {\"delta\":\"lo\"}\n\n")),
                Ok(Bytes::from_static(b"data: [DONE]\n\n")),
            ]);
            Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(chunks))
                .unwrap()
        }),
    );
    let port = spawn_engine_stub(engine).await;
    let app = test_app(test_config(port));

    let (status, headers, bytes) = send(
        &app.router,
        Method::POST,
        "/v1/chat/completions",
        Body::from(
            json!({"messages": [{"role": "user", "content": "hi"}], "stream": true}).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.contains("Hel"));
    assert!(text.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn unreachable_engine_is_bad_gateway() {
    let app = test_app(test_config(closed_port().await));

    let (status, body) = send_json(&app.router, Method::GET, "/v1/models", None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], 502);
    assert!(body["error"].as_str().is_some());
}
