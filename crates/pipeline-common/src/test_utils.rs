use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::StreamerContext;

/// Install a test-writer subscriber once per test binary.
///
/// `RUST_LOG` overrides the default `debug` level, e.g.
/// `RUST_LOG=encoding_filter=trace` to see every chunk decision.
#[inline]
pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::DEBUG.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Context for a stream called `test-stream`.
#[inline]
pub fn create_test_context() -> Arc<StreamerContext> {
    named_test_context("test-stream")
}

#[inline]
pub fn named_test_context(name: &str) -> Arc<StreamerContext> {
    Arc::new(StreamerContext::with_name(name))
}
