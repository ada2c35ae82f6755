//! Tracing setup for binaries.
//!
//! Libraries in this workspace only emit events; the subscriber is
//! installed once by whichever binary hosts them.

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,petal=debug,sqlx=warn";

/// Installs the global `fmt` subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=petal_checkout=trace` - Trace the services only
/// - Default: INFO, with DEBUG for the petal crates
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
