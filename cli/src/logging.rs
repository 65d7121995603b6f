//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; user-facing output goes to
//! stdout through [`crate::output::OutputContext`].

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `tyb_deploy=trace`.
pub const LOG_ENV: &str = "TYB_DEPLOY_LOG";

/// Install the global subscriber. `verbose` lowers the default level to debug.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
