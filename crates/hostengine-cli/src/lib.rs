//! Library half of the `hostengine` binary: argument parsing and
//! process setup, kept out of `main.rs` so they can be tested.

#![deny(unsafe_code)]

pub mod parser;
pub mod setup;

pub use parser::Cli;
pub use setup::{init_tracing, load_env_files, shutdown_signal};
