use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Install a formatted `tracing` subscriber for the process. The
/// filter is read from `RUST_LOG` and falls back to [`DEFAULT_FILTER`].
/// Calling this twice is harmless, the second install is ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
