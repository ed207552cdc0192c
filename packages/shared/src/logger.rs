//! Logging setup utilities for Kakehashi binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crate whose log output is enabled by default alongside the binary.
const SERVER_CRATE: &str = "kakehashi_server";

/// Build the default `EnvFilter` directive used when `RUST_LOG` is not set.
///
/// `tower_http` is included so that HTTP request traces show up at the same level.
pub fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    format!(
        "{server}={lvl},{bin}={lvl},tower_http={lvl}",
        server = SERVER_CRATE,
        bin = binary_name.replace('-', "_"),
        lvl = default_log_level
    )
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "kakehashi-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use kakehashi_shared::logger::setup_logger;
///
/// setup_logger("kakehashi-server", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
