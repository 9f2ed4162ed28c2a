//! Shared plumbing for the `xcarve` and `xcarve-coverage` binaries.

pub mod commands;
pub mod output;

use tracing_subscriber::EnvFilter;

/// Process exit code for user-initiated cancellation (SIGINT).
pub const EXIT_CANCELLED: u8 = 130;

/// Initialize tracing from `RUST_LOG`, falling back to `info` (or `debug`
/// with `--verbose`).
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
