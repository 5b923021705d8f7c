//! Tracing setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;

/// Build the filter: `RUST_LOG` wins, else the configured directive.
pub fn env_filter(config: &RuntimeConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
}

/// Install the global `fmt` subscriber.
///
/// Returns `false` when a global subscriber is already installed.
pub fn init_tracing(config: &RuntimeConfig) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let config = RuntimeConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
