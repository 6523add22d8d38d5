//! OpenAI-compatible proxy handlers.
//!
//! Requests are relayed to the engine as-is; upstream statuses and bodies
//! come back unmodified. Streaming completions are passed through as an
//! event stream.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::response::Response;
use tracing::debug;

use hostengine_proxy::{ChatCompletionRequest, ProxyBody, ProxyRequest, ProxyResponse};

use crate::error::HttpError;
use crate::state::AppState;

/// Proxied model list.
pub async fn list_models(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let request = ProxyRequest::new(Method::GET, "/v1/models").with_headers(headers);
    relay(&state, request).await
}

/// Proxied chat completion.
///
/// Malformed JSON is a 400, a schema violation a 422. The validated
/// request, with defaults filled in, is what reaches the engine.
pub async fn chat_completions(
    State(state): State<AppState>,
    mut headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| HttpError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let request: ChatCompletionRequest =
        serde_json::from_value(value).map_err(|e| HttpError::Unprocessable(e.to_string()))?;
    request.validate(state.config.max_tokens)?;

    let payload = serde_json::to_vec(&request)
        .map_err(|e| HttpError::Internal(format!("Failed to encode request: {e}")))?;
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    debug!(
        messages = request.messages.len(),
        stream = request.stream,
        max_tokens = request.max_tokens,
        "Proxying chat completion"
    );
    let proxy_request = ProxyRequest::new(Method::POST, "/v1/chat/completions")
        .with_headers(headers)
        .with_body(payload)
        .streaming(request.stream);
    relay(&state, proxy_request).await
}

async fn relay(state: &AppState, request: ProxyRequest) -> Result<Response, HttpError> {
    let response = state.forwarder.forward(request).await?;
    Ok(into_response(response))
}

fn into_response(upstream: ProxyResponse) -> Response {
    let ProxyResponse {
        status,
        mut headers,
        body,
    } = upstream;

    let body = match body {
        ProxyBody::Buffered(bytes) => Body::from(bytes),
        ProxyBody::Stream(chunks) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            // Disable nginx buffering
            headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
            Body::from_stream(chunks)
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
