//! Process-level setup: dotenv files, tracing and shutdown signals.

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Dotenv files read at startup; earlier files win.
pub const ENV_FILES: &[&str] = &[".env.host", ".env"];

/// Load [`ENV_FILES`] from the working directory.
///
/// Missing files are skipped. Variables already present in the process
/// environment are never overwritten.
pub fn load_env_files() {
    for file in ENV_FILES {
        dotenvy::from_filename(file).ok();
    }
}

/// Build the log filter: `RUST_LOG` when set, else `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .try_init()
        .ok();
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_level_does_not_panic() {
        let filter = env_filter("not a = valid [filter");
        assert!(!filter.to_string().is_empty());
    }
}
