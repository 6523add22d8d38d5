//! HTTP readiness check for the engine.
//!
//! A single probe is one GET against the engine's model listing. Any
//! transport error, timeout or non-2xx status counts as "not ready".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use hostengine_core::{EngineConfig, HealthProbe};

/// Path probed to decide whether the engine is serving.
pub const READINESS_PATH: &str = "/v1/models";

/// Probes the engine over HTTP.
#[derive(Debug, Clone)]
pub struct HttpHealthProber {
    client: Client,
    url: String,
}

impl HttpHealthProber {
    /// Prober for the engine at `base_url` with a per-probe `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}{READINESS_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        Self::new(&config.engine_base_url(), config.timings.health_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProber {
    async fn is_healthy(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(url = %self.url, status = %response.status(), "Engine not ready");
                false
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Engine health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer exactly one HTTP request with `status_line`.
    async fn serve_once(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}"
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    fn prober(port: u16) -> HttpHealthProber {
        HttpHealthProber::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn probes_model_listing() {
        let prober = HttpHealthProber::new("http://127.0.0.1:8082/", Duration::from_secs(5)).unwrap();
        assert_eq!(prober.url(), "http://127.0.0.1:8082/v1/models");
    }

    #[tokio::test]
    async fn success_status_is_healthy() {
        let port = serve_once("200 OK").await;
        assert!(prober(port).is_healthy().await);
    }

    #[tokio::test]
    async fn error_status_is_not_healthy() {
        let port = serve_once("503 Service Unavailable").await;
        assert!(!prober(port).is_healthy().await);
    }

    #[tokio::test]
    async fn refused_connection_is_not_healthy() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(!prober(port).is_healthy().await);
    }
}
