//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise `level` (from configuration) applies.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
