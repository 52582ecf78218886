//! Observability and tracing configuration.

use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const fn default_log_level() -> &'static str {
    "info,staffly_session=debug,staffly_core=debug"
}

#[must_use]
fn build_env_filter() -> tracing_subscriber::EnvFilter {
    let current =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_level().to_string());
    tracing_subscriber::EnvFilter::new(current)
}

/// Initializes the tracing subscriber for the embedding application.
///
/// Sets up structured logging with environment-based filtering and pretty
/// formatting for development. The log level can be configured via the
/// standard `RUST_LOG` environment variable; by default dependencies log at
/// `info` and the session crates at `debug`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    let env_filter = build_env_filter();
    let fmt_layer = layer().pretty();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
