//! Shared helpers for router tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use hostengine_axum::{AxumContext, bootstrap_with, create_router};
use hostengine_core::testing::{FakeLauncher, ScriptedProbe};
use hostengine_core::{EngineConfig, SupervisorTimings};
use hostengine_runtime::EngineSupervisor;

/// External port reported in status bodies. Never bound by router tests.
pub const TEST_PORT: u16 = 18081;

/// Timings short enough for real-clock tests.
pub fn fast_timings() -> SupervisorTimings {
    SupervisorTimings {
        startup_attempts: 3,
        startup_poll_interval: Duration::from_millis(10),
        health_timeout: Duration::from_millis(200),
        grace_timeout: Duration::from_millis(200),
        kill_timeout: Duration::from_millis(200),
        drain_delay: Duration::from_millis(10),
        monitor_interval: Duration::from_secs(60),
        proxy_timeout: Duration::from_secs(5),
        proxy_connect_timeout: Duration::from_secs(1),
        ..SupervisorTimings::default()
    }
}

pub fn test_config(internal_port: u16) -> EngineConfig {
    EngineConfig {
        host: "127.0.0.1".to_string(),
        port: TEST_PORT,
        internal_port,
        default_model: "model-a".to_string(),
        model_directory: PathBuf::from("/nonexistent/hostengine-models"),
        max_tokens: 8192,
        autostart: false,
        timings: fast_timings(),
        ..EngineConfig::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub launcher: Arc<FakeLauncher>,
    pub probe: Arc<ScriptedProbe>,
    pub supervisor: Arc<EngineSupervisor>,
}

pub fn test_context(config: EngineConfig) -> (AxumContext, Arc<FakeLauncher>, Arc<ScriptedProbe>) {
    let launcher = Arc::new(FakeLauncher::default());
    let probe = Arc::new(ScriptedProbe::always(true));
    let ctx = bootstrap_with(config, launcher.clone(), probe.clone()).unwrap();
    (ctx, launcher, probe)
}

pub fn test_app(config: EngineConfig) -> TestApp {
    let (ctx, launcher, probe) = test_context(config);
    let supervisor = Arc::clone(&ctx.supervisor);
    TestApp {
        router: create_router(ctx),
        launcher,
        probe,
        supervisor,
    }
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Serve `router` as a stand-in engine and return its port.
pub async fn spawn_engine_stub(router: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Body,
) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes)
}

pub async fn send_json(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
    let (status, _, bytes) = send(router, method, uri, body).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
