use std::env;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable consulted for the log filter directive.
pub const LOG_ENV: &str = "CPAI_LOG";

/// Installs the global subscriber. Logs go to stderr so that a bundle written
/// to stdout stays clean for piping.
pub fn init_logger(verbose: bool) {
    let default = if verbose { "cpai=debug" } else { "warn" };
    let filter = env::var(LOG_ENV).unwrap_or_else(|_| default.to_string());
    let filter_layer = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(false),
        )
        .with(filter_layer)
        .try_init();
}
