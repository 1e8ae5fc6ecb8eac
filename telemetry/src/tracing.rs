//! Tracing subscriber setup.
//!
//! Initialization is guarded so that repeated calls are no-ops, which matters
//! in tests where every test function initializes telemetry independently.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for a running service.
///
/// The filter is read from `RUST_LOG`, falling back to `info` when the
/// variable is unset or malformed.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    });
}

/// Initializes tracing for tests.
///
/// Output is routed through the test writer so that logs are captured per
/// test and only shown for failing tests.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .init();
    });
}
