//! Core domain types and port definitions for hostengine.
//!
//! This crate has no knowledge of HTTP servers or OS processes. It defines
//! the resolved configuration, the status model, and the traits that the
//! runtime implements (`EngineLauncher`, `EngineProcessHandle`,
//! `HealthProbe`).
#![deny(unsafe_code)]

pub mod config;
pub mod domain;
pub mod ports;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{ConfigError, EngineConfig, LaunchSpec, SupervisorTimings};
pub use domain::{EngineState, InstalledModel, StatusSnapshot, scan_model_directory};
pub use ports::{EngineLauncher, EngineProcessHandle, HealthProbe, ProcessError};
