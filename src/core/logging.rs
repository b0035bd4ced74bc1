//! Logging setup shared by the plugin binaries.
//!
//! Logs go to stderr only; stdout carries the `info` payload.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "forensicstore_plugins=info";
const VERBOSE_LOG_FILTER: &str = "forensicstore_plugins=debug";

/// Install the global subscriber. `RUST_LOG` wins over `verbose`. Calling this
/// more than once is harmless.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    });

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .try_init();
}
