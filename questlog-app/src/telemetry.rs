//! Logging setup.
//!
//! Installs a global `tracing-subscriber` fmt subscriber. The level comes
//! from `[general] log_level`; `RUST_LOG`, when set, wins.

use questlog_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if present and valid, else the configured level.
#[must_use]
pub fn filter(config: &GeneralConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed (by an earlier
/// call, or by a test harness), in which case nothing changes.
pub fn init(config: &GeneralConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(true);
    let installed = if config.json_logs {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    if installed {
        tracing::debug!(level = %config.log_level, json = config.json_logs, "Logging initialised");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let config = GeneralConfig::default();
        let _ = init(&config);
        assert!(!init(&config));
    }
}
