//! Tracing subscriber bootstrap
//!
//! The core crate only emits events; binaries and tests call
//! [`init_logging`] once to see them.

use crate::app::AppConfig;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to the configured level
pub fn env_filter(app: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(app.default_directive()))
}

/// Install a global fmt subscriber
///
/// Returns `false` when a subscriber was already installed, which is
/// expected when several tests share a process.
pub fn init_logging(app: &AppConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(app))
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let app = AppConfig::default();
        init_logging(&app);
        assert!(!init_logging(&app));
        tracing::info!(event_type = "logging_ready", "Logging initialized");
    }
}
