//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the web adapter. Concrete launcher, prober and forwarder are
//! instantiated here; tests inject fakes through [`bootstrap_with`].

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use hostengine_core::{EngineConfig, EngineLauncher, HealthProbe};
use hostengine_proxy::ProxyForwarder;
use hostengine_runtime::{CommandLauncher, EngineSupervisor, HttpHealthProber, StatusReporter};

use crate::routes::create_router;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsConfig {
    /// Allow all origins.
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

impl CorsConfig {
    /// An empty list allows any origin.
    pub fn from_origins(origins: &[String]) -> Self {
        if origins.is_empty() {
            Self::AllowAll
        } else {
            Self::AllowOrigins(origins.to_vec())
        }
    }
}

/// Application context for the Axum adapter.
///
/// Constructed once at startup and shared by every handler.
pub struct AxumContext {
    pub config: Arc<EngineConfig>,
    /// Sole owner of the engine process.
    pub supervisor: Arc<EngineSupervisor>,
    pub status: StatusReporter,
    pub forwarder: ProxyForwarder,
    pub cors: CorsConfig,
}

/// Wire the production launcher and health prober.
pub fn bootstrap(config: EngineConfig) -> Result<AxumContext> {
    let launcher = CommandLauncher::from_config(&config);
    let prober =
        HttpHealthProber::from_config(&config).context("Failed to build health probe client")?;
    bootstrap_with(config, Arc::new(launcher), Arc::new(prober))
}

/// Wire the context around the given launcher and prober.
pub fn bootstrap_with(
    config: EngineConfig,
    launcher: Arc<dyn EngineLauncher>,
    prober: Arc<dyn HealthProbe>,
) -> Result<AxumContext> {
    config.validate()?;

    let forwarder = ProxyForwarder::from_config(&config)?;
    let cors = CorsConfig::from_origins(&config.cors_origins);
    let config = Arc::new(config);
    let supervisor = Arc::new(EngineSupervisor::new(
        Arc::clone(&config),
        launcher,
        prober,
    ));
    let status = StatusReporter::new(Arc::clone(&supervisor));

    info!(
        listen = %config.listen_addr(),
        engine = %config.engine_base_url(),
        default_model = %config.default_model,
        model_directory = %config.model_directory.display(),
        max_tokens = config.max_tokens,
        "Host engine configured"
    );

    Ok(AxumContext {
        config,
        supervisor,
        status,
        forwarder,
        cors,
    })
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn start_server(
    config: EngineConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let ctx = bootstrap(config)?;
    let addr = ctx.config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    serve(ctx, listener, shutdown).await
}

/// Serve on an already-bound listener.
///
/// The listener is bound before the default model is started, so `/health`
/// answers "starting" right away. After `shutdown` resolves and in-flight
/// requests drain, the engine is stopped.
pub async fn serve(
    ctx: AxumContext,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let supervisor = Arc::clone(&ctx.supervisor);
    let addr = listener.local_addr()?;
    info!(%addr, "hostengine listening");

    if ctx.config.autostart {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            if let Err(e) = supervisor.start(None).await {
                error!(error = %e, "Failed to start default model");
            }
        });
    } else {
        info!("Autostart disabled; waiting for /start or /load");
    }

    let app = create_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped; shutting down engine");
    supervisor.stop().await;
    Ok(())
}
