//! Logging initialization using the `tracing` ecosystem.
//!
//! The mirror runs several background tasks whose failures are surfaced only
//! through logs (sync cycles are retried on the next tick), so structured
//! logging is part of the public contract. Console output is always on; an
//! optional daily-rotating file sink can be added for long-lived deployments.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Call once at program start. `default_level` applies when the `RUST_LOG`
/// env var is not set. When `file_dir` is given, a daily-rotating log file
/// named after `prefix` is written there in addition to the console output.
pub fn init_logging(default_level: &str, file_dir: Option<&str>, prefix: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    match file_dir {
        Some(dir) => {
            let file_layer = fmt::layer()
                .with_writer(tracing_appender::rolling::daily(dir, prefix))
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();
        }
    }
}
