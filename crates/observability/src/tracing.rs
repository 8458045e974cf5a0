//! Tracing/logging initialization.
//!
//! Minimal for now; this can evolve into layered JSON logging, correlation
//! IDs, etc.

use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset: quiet dependencies, verbose
/// admission/sweep internals.
const DEFAULT_DIRECTIVES: &str = "info,docflow=debug";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Human-readable output routed through the test harness capture.
///
/// Call at the top of integration tests that want span output; idempotent
/// like [`init`].
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
