//! Initialization helpers for the application startup.

use crate::config::LoggingConfig;

/// HTTP stack crates that are silenced unless the filter names them.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(build_filter(&config.level)));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if config.format == "compact" {
        builder.compact().init();
    } else {
        builder.init();
    }
}

fn build_filter(level: &str) -> String {
    let mut filter = level.to_string();
    for target in QUIET_TARGETS {
        if !filter.contains(target) {
            filter.push_str(&format!(",{}=off", target));
        }
    }
    filter
}
