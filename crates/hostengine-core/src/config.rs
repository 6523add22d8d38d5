//! Resolved configuration for the host engine.
//!
//! The configuration is resolved once by the binary (flags, environment,
//! dotenv files) and handed to the composition root as a plain value.
//! Nothing in this crate reads the environment.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loopback address the engine is always bound to.
pub const ENGINE_BIND_HOST: &str = "127.0.0.1";

/// Error raised when a resolved configuration is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds a value outside its allowed range.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Fixed timing constants used by the supervisor, prober and forwarder.
///
/// Defaults match production behaviour. Tests shrink them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorTimings {
    /// Number of readiness checks before a start is declared failed.
    pub startup_attempts: u32,
    /// Delay between readiness checks during startup.
    pub startup_poll_interval: Duration,
    /// Timeout of a single readiness check.
    pub health_timeout: Duration,
    /// How long a graceful termination may take before force-kill.
    pub grace_timeout: Duration,
    /// How long to wait for the process to be reaped after force-kill.
    pub kill_timeout: Duration,
    /// Pause between stopping and starting during a hot-swap.
    pub drain_delay: Duration,
    /// Period of the background liveness check.
    pub monitor_interval: Duration,
    /// Read timeout for proxied calls (generation can be slow).
    pub proxy_timeout: Duration,
    /// Connect timeout for proxied calls.
    pub proxy_connect_timeout: Duration,
    /// Automatic restarts allowed before giving up.
    pub max_restart_attempts: u32,
    /// Base of the exponential restart backoff, in seconds.
    pub backoff_base: u32,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            startup_attempts: 30,
            startup_poll_interval: Duration::from_secs(1),
            health_timeout: Duration::from_secs(5),
            grace_timeout: Duration::from_secs(10),
            kill_timeout: Duration::from_secs(5),
            drain_delay: Duration::from_secs(2),
            monitor_interval: Duration::from_secs(10),
            proxy_timeout: Duration::from_secs(120),
            proxy_connect_timeout: Duration::from_secs(10),
            max_restart_attempts: 3,
            backoff_base: 2,
        }
    }
}

/// Parameters a single engine process is launched with.
///
/// Crash recovery respawns with the spec of the process that died.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Model identifier passed to the engine.
    pub model_id: String,
    /// Token limit passed to the engine.
    pub max_tokens: u32,
}

impl LaunchSpec {
    pub fn new(model_id: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model_id: model_id.into(),
            max_tokens,
        }
    }
}

/// Configuration for the host engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Host the management/proxy server listens on.
    pub host: String,
    /// Port the management/proxy server listens on.
    pub port: u16,
    /// Loopback port the engine process listens on.
    pub internal_port: u16,
    /// Model started when no model is named.
    pub default_model: String,
    /// Directory holding installed model folders.
    pub model_directory: PathBuf,
    /// Token limit handed to the engine.
    pub max_tokens: u32,
    /// Program launched as the engine (interpreter or binary).
    pub engine_program: String,
    /// Module passed as `-m <module>` when set.
    pub engine_module: Option<String>,
    /// Default tracing filter.
    pub log_level: String,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Start the default model when the server boots.
    pub autostart: bool,
    /// Supervisor timing constants.
    pub timings: SupervisorTimings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            internal_port: 8082,
            default_model: "mlx-community/Qwen2.5-7B-Instruct-4bit".to_string(),
            model_directory: PathBuf::from("./models"),
            max_tokens: 32768,
            engine_program: "python3".to_string(),
            engine_module: Some("mlx_lm.server".to_string()),
            log_level: "info".to_string(),
            cors_origins: Vec::new(),
            autostart: true,
            timings: SupervisorTimings::default(),
        }
    }
}

impl EngineConfig {
    /// Base URL of the engine's loopback endpoint.
    pub fn engine_base_url(&self) -> String {
        format!("http://{ENGINE_BIND_HOST}:{}", self.internal_port)
    }

    /// Address the management/proxy server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Launch spec for `model`, or the default model when `None`.
    pub fn launch_spec(&self, model: Option<String>) -> LaunchSpec {
        LaunchSpec::new(
            model.unwrap_or_else(|| self.default_model.clone()),
            self.max_tokens,
        )
    }

    /// Replace the timing constants.
    #[must_use]
    pub fn with_timings(mut self, timings: SupervisorTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Check that the configuration can actually be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must be non-zero"));
        }
        if self.internal_port == 0 {
            return Err(ConfigError::invalid("internal_port", "must be non-zero"));
        }
        if self.internal_port == self.port && self.host_overlaps_loopback() {
            return Err(ConfigError::invalid(
                "internal_port",
                format!("collides with the external port {}", self.port),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::invalid("max_tokens", "must be at least 1"));
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::invalid("default_model", "must not be empty"));
        }
        if self.engine_program.trim().is_empty() {
            return Err(ConfigError::invalid("engine_program", "must not be empty"));
        }
        if self.timings.backoff_base < 2 {
            return Err(ConfigError::invalid("backoff_base", "must be at least 2"));
        }
        if self.timings.max_restart_attempts == 0 {
            return Err(ConfigError::invalid(
                "max_restart_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Whether the external listener would also claim the engine's loopback port.
    fn host_overlaps_loopback(&self) -> bool {
        if self.host == "localhost" {
            return true;
        }
        self.host
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback() || ip.is_unspecified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine_base_url(), "http://127.0.0.1:8082");
        assert_eq!(config.listen_addr(), "0.0.0.0:8081");
    }

    #[test]
    fn launch_spec_falls_back_to_default_model() {
        let config = EngineConfig::default();
        let spec = config.launch_spec(None);
        assert_eq!(spec.model_id, config.default_model);
        assert_eq!(spec.max_tokens, 32768);

        let spec = config.launch_spec(Some("model-b".to_string()));
        assert_eq!(spec.model_id, "model-b");
    }

    #[test]
    fn internal_port_must_not_collide_on_loopback() {
        let config = EngineConfig {
            internal_port: 8081,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "internal_port",
                ..
            })
        ));

        // A distinct external interface does not claim the loopback port.
        let config = EngineConfig {
            host: "192.168.1.20".to_string(),
            internal_port: 8081,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_values() {
        let zero_tokens = EngineConfig {
            max_tokens: 0,
            ..EngineConfig::default()
        };
        assert!(zero_tokens.validate().is_err());

        let empty_model = EngineConfig {
            default_model: "  ".to_string(),
            ..EngineConfig::default()
        };
        assert!(empty_model.validate().is_err());

        let flat_backoff = EngineConfig::default().with_timings(SupervisorTimings {
            backoff_base: 1,
            ..SupervisorTimings::default()
        });
        assert!(flat_backoff.validate().is_err());
    }
}
