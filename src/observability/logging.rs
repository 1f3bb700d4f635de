//! Structured logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when set.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("faas_gateway={default_level},tower_http={default_level}").into());

    // A subscriber may already be installed (tests, embedding binaries)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
