//! Builds and spawns the engine command line.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use hostengine_core::config::ENGINE_BIND_HOST;
use hostengine_core::{EngineConfig, EngineLauncher, EngineProcessHandle, LaunchSpec, ProcessError};

use super::child::ChildEngineProcess;
use super::stream::spawn_stream_reader;

/// Log level the engine itself is started with.
const ENGINE_LOG_LEVEL: &str = "INFO";

/// Launches the engine as a child process bound to the loopback port.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    module: Option<String>,
    port: u16,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, module: Option<String>, port: u16) -> Self {
        Self {
            program: program.into(),
            module,
            port,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.engine_program.clone(),
            config.engine_module.clone(),
            config.internal_port,
        )
    }

    /// Arguments passed after the program name.
    pub fn engine_args(&self, spec: &LaunchSpec) -> Vec<String> {
        let mut args = Vec::with_capacity(12);
        if let Some(module) = &self.module {
            args.push("-m".to_string());
            args.push(module.clone());
        }
        args.extend([
            "--model".to_string(),
            spec.model_id.clone(),
            "--host".to_string(),
            ENGINE_BIND_HOST.to_string(),
            "--port".to_string(),
            self.port.to_string(),
            "--max-tokens".to_string(),
            spec.max_tokens.to_string(),
            "--log-level".to_string(),
            ENGINE_LOG_LEVEL.to_string(),
        ]);
        args
    }
}

impl EngineLauncher for CommandLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn EngineProcessHandle>, ProcessError> {
        let args = self.engine_args(spec);
        debug!(program = %self.program, ?args, "Spawning engine");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child =
            ChildEngineProcess::spawn_in_group(&mut command).map_err(|source| {
                ProcessError::Spawn {
                    program: self.program.clone(),
                    source,
                }
            })?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, pid, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, pid, "stderr");
        }

        info!(
            ?pid,
            model = %spec.model_id,
            port = self.port,
            "Spawned engine process"
        );
        Ok(Box::new(ChildEngineProcess::from_child(child)))
    }
}
