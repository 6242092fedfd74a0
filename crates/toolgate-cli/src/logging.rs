//! Diagnostic logging setup.
//!
//! Tracing goes to stderr so stdout stays free for the kiosk screen.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when neither `--log-level` nor `RUST_LOG` is given.
pub fn default_level(debug_mode: bool) -> &'static str {
    if debug_mode { "debug" } else { "info" }
}

/// Install the global subscriber.
///
/// An explicit level wins over `RUST_LOG`. An unparseable filter falls back
/// to the default level.
pub fn init(level: Option<&str>, debug_mode: bool) {
    let fallback = default_level(debug_mode);
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(fallback)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
