//! Logging and tracing initialization.
//!
//! The filter directive comes from `LoggingConfig::level`, which
//! `WorkerConfig::from_env` fills from `REELCUT_LOG`. One knob drives both
//! the plain and JSON subscribers; an invalid directive falls back to
//! `info` instead of aborting worker startup.

use crate::config::LoggingConfig;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber with the given configuration.
pub fn init_logging(config: &LoggingConfig) {
    let filter = build_filter(&config.level);

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        // The subscriber is not installed yet, so this cannot be a
        // tracing warn.
        eprintln!("Invalid log filter {directive:?} ({e}), using \"info\"");
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_directives_parse() {
        assert_eq!(build_filter("info").to_string(), "info");
        let rendered = build_filter("reelcut=debug,warn").to_string();
        assert!(rendered.contains("reelcut=debug"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn test_invalid_directive_falls_back_to_info() {
        assert_eq!(build_filter("not a [valid] directive!!").to_string(), "info");
    }
}
