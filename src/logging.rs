//! Logging setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "keyrotate=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Output goes to stderr so command
/// output on stdout stays machine readable.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();

    if result.is_ok() {
        tracing::debug!(filter = default_filter, "Logging initialized");
    }
}
