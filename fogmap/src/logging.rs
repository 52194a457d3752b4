//! Logging bootstrap for hosts that do not install their own subscriber.
//!
//! - Compact single-line output on stdout
//! - Filter from `RUST_LOG`, falling back to the given default directive
//! - Safe to call more than once: later calls return an error

use std::io;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "fogmap=info";

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<(), TryInitError> {
    let filter = env_filter(default_directive);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .try_init()
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
