//! Logging configuration
//!
//! Initializes tracing for the application.

/// Initializes logging with the specified fallback level
///
/// `RUST_LOG` wins over `level` when set. Safe to call more than once; only
/// the first call installs a subscriber.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .try_init();
}
