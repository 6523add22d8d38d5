//! Shared fixtures for supervisor tests.
#![allow(dead_code)]

use std::sync::Arc;

use hostengine_core::testing::{FakeLauncher, ScriptedProbe};
use hostengine_core::{EngineConfig, HealthProbe};
use hostengine_runtime::{EngineSupervisor, StatusReporter};

pub struct Harness {
    pub launcher: Arc<FakeLauncher>,
    pub supervisor: Arc<EngineSupervisor>,
    pub status: StatusReporter,
}

pub fn config() -> EngineConfig {
    EngineConfig {
        default_model: "model-a".to_string(),
        max_tokens: 2048,
        ..EngineConfig::default()
    }
}

pub fn harness_with(launcher: FakeLauncher, probe: Arc<dyn HealthProbe>) -> Harness {
    let launcher = Arc::new(launcher);
    let supervisor = Arc::new(EngineSupervisor::new(
        Arc::new(config()),
        launcher.clone(),
        probe,
    ));
    let status = StatusReporter::new(Arc::clone(&supervisor));
    Harness {
        launcher,
        supervisor,
        status,
    }
}

/// Healthy-on-first-probe engine that stays alive.
pub fn harness() -> Harness {
    harness_with(FakeLauncher::default(), Arc::new(ScriptedProbe::always(true)))
}
