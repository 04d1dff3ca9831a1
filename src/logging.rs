//! Logging setup shared by the CLI and the HTTP service.
//!
//! Library code logs through the `log` facade and `tracing` macros; this
//! installs a `tracing-subscriber` formatter that also picks up `log` records.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        log::debug!("[Logging] Subscriber already installed");
    }
}
