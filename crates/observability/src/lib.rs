//! Tracing/logging setup shared by binaries, benchmarks and tests.

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Logging configuration.
pub mod config;

/// Tracing subscriber installation.
pub mod tracing;

pub use config::{LogFormat, TracingConfig, UnknownLogFormat};
