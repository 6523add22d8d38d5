//! Command-line and environment parsing.
//!
//! Every flag falls back to an `MLX_*` environment variable, then to the
//! built-in default. The result is a plain [`EngineConfig`].

use std::path::PathBuf;

use clap::Parser;

use hostengine_core::{EngineConfig, SupervisorTimings};

/// Supervise an MLX inference engine and proxy OpenAI-compatible requests to it.
#[derive(Debug, Parser)]
#[command(name = "hostengine")]
#[command(version, about)]
pub struct Cli {
    /// Host the management/proxy server listens on
    #[arg(long, env = "MLX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the management/proxy server listens on
    #[arg(long, env = "MLX_PORT", default_value_t = 8081)]
    pub port: u16,

    /// Loopback port the engine listens on
    #[arg(long, env = "MLX_INTERNAL_PORT", default_value_t = 8082)]
    pub internal_port: u16,

    /// Model started at boot and by `/start` without a model
    #[arg(
        long,
        env = "MLX_DEFAULT_MODEL",
        default_value = "mlx-community/Qwen2.5-7B-Instruct-4bit"
    )]
    pub default_model: String,

    /// Directory holding installed model folders
    #[arg(long, env = "MLX_MODEL_DIRECTORY", default_value = "./models")]
    pub model_directory: PathBuf,

    /// Token limit handed to the engine
    #[arg(long, env = "MLX_MAX_TOKENS", default_value_t = 32768)]
    pub max_tokens: u32,

    /// Interpreter or binary launched as the engine
    #[arg(long, env = "MLX_ENGINE_PROGRAM", default_value = "python3")]
    pub engine_program: String,

    /// Module passed as `-m <module>`; empty launches the program directly
    #[arg(long, env = "MLX_ENGINE_MODULE", default_value = "mlx_lm.server")]
    pub engine_module: String,

    /// Default log filter (RUST_LOG takes precedence)
    #[arg(long, env = "MLX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Comma-separated allowed CORS origins; empty allows any
    #[arg(long, env = "MLX_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Do not start the default model at boot
    #[arg(long, env = "MLX_NO_AUTOSTART")]
    pub no_autostart: bool,
}

impl Cli {
    /// Resolve the parsed arguments into the server configuration.
    pub fn into_config(self) -> EngineConfig {
        let engine_module = Some(self.engine_module.trim().to_string()).filter(|m| !m.is_empty());
        let cors_origins = self
            .cors_origins
            .into_iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        EngineConfig {
            host: self.host,
            port: self.port,
            internal_port: self.internal_port,
            default_model: self.default_model,
            model_directory: self.model_directory,
            max_tokens: self.max_tokens,
            engine_program: self.engine_program,
            engine_module,
            log_level: self.log_level,
            cors_origins,
            autostart: !self.no_autostart,
            timings: SupervisorTimings::default(),
        }
    }
}
