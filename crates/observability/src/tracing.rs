//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

use crate::config::{LogFormat, TracingConfig};

/// Initialize tracing/logging for the process from `RUST_LOG` and
/// `CHRONICLE_LOG_FORMAT`.
///
/// Safe to call multiple times (subsequent calls are no-ops). An invalid
/// environment falls back to the defaults.
pub fn init() {
    init_with(&TracingConfig::from_env().unwrap_or_default());
}

/// Initialize tracing/logging with an explicit configuration.
pub fn init_with(config: &TracingConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = match config.format {
        LogFormat::Json => builder.json().with_timer(SystemTime).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}
