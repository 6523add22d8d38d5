//! Request forwarding to the engine with streaming support.
//!
//! Upstream error statuses are data, not errors: they come back as a
//! [`ProxyResponse`] with the engine's status and body. Only transport
//! failures surface as [`ProxyError`], with reqwest's error (timeouts
//! included) carried unmodified.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, error, warn};

use hostengine_core::EngineConfig;

/// Headers that should NOT be forwarded (hop-by-hop headers).
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    // Also strip these for correctness
    "host",
    "content-length",
    "authorization",
];

/// Check if a header should be forwarded.
pub fn should_forward_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !HOP_BY_HOP_HEADERS.contains(&lower.as_str())
}

fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| should_forward_header(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Error from forwarding a request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The engine could not be reached, went silent or the transfer failed.
    #[error("Engine request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The request path cannot be appended to the engine URL.
    #[error("Invalid proxy path: {0}")]
    InvalidPath(String),
}

/// Lazy, finite byte-chunk stream of a streaming response.
///
/// A final `Err` item marks a transfer that ended early; `None` after `Ok`
/// items is a clean end of stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProxyError>> + Send>>;

/// An inbound request to relay.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path and query, e.g. `/v1/chat/completions`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub streaming: bool,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            streaming: false,
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub const fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

pub enum ProxyBody {
    Buffered(Bytes),
    Stream(ByteStream),
}

impl std::fmt::Debug for ProxyBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// The engine's answer, relayed verbatim.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    /// Upstream headers minus hop-by-hop headers.
    pub headers: HeaderMap,
    pub body: ProxyBody,
}

/// Forwards requests to the engine's loopback endpoint.
///
/// Cheap to share: many calls may be in flight at once.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ProxyForwarder {
    /// Forwarder for `base_url`; `timeout` bounds a buffered call and every
    /// single read, so a streamed response may run longer as long as chunks
    /// keep arriving.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(timeout)
            .build()
            .map_err(ProxyError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ProxyError> {
        Self::new(
            config.engine_base_url(),
            config.timings.proxy_timeout,
            config.timings.proxy_connect_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn target_url(&self, path: &str) -> Result<String, ProxyError> {
        if !path.starts_with('/') || path.contains("://") || path.split('/').any(|s| s == "..") {
            return Err(ProxyError::InvalidPath(path.to_string()));
        }
        Ok(format!("{}{path}", self.base_url))
    }

    /// Relay `request` and return the engine's response.
    ///
    /// A streaming request with a success status yields
    /// [`ProxyBody::Stream`]; everything else is buffered.
    pub async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let url = self.target_url(&request.path)?;
        debug!(
            method = %request.method,
            %url,
            streaming = request.streaming,
            "Forwarding to engine"
        );

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(filter_headers(&request.headers));
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        if !request.streaming {
            builder = builder.timeout(self.timeout);
        }
        let response = builder.send().await.map_err(|e| {
            error!(%url, timed_out = e.is_timeout(), error = %e, "Failed to reach engine");
            ProxyError::Upstream(e)
        })?;

        let status = response.status();
        let headers = filter_headers(response.headers());

        if request.streaming && status.is_success() {
            let body = relay_chunks(response.bytes_stream());
            return Ok(ProxyResponse {
                status,
                headers,
                body: ProxyBody::Stream(body),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            error!(%url, error = %e, "Failed to read engine response");
            ProxyError::Upstream(e)
        })?;
        if !status.is_success() {
            warn!(%url, %status, "Engine returned an error status; relaying");
        }

        Ok(ProxyResponse {
            status,
            headers,
            body: ProxyBody::Buffered(body),
        })
    }
}

/// Relay upstream chunks, ending the stream after the first error.
fn relay_chunks<S>(upstream: S) -> ByteStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    Box::pin(stream::unfold(
        Some(Box::pin(upstream)),
        |state| async move {
            let mut upstream = state?;
            match upstream.next().await? {
                Ok(chunk) => Some((Ok(chunk), Some(upstream))),
                Err(e) => {
                    warn!(timed_out = e.is_timeout(), error = %e, "Engine stream broke off");
                    Some((Err(ProxyError::Upstream(e)), None))
                }
            }
        },
    ))
}
