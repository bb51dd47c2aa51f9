//! Logging infrastructure for Switchyard

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env-filter defaulting to the configured level.
///
/// `RUST_LOG` wins when set.
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("switchyard={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
