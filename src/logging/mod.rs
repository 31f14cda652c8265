//! Structured logging init (SPEC_FULL.md §2 Ambient Logging), a simplified
//! stdout-only version of the teacher's `infrastructure::logging`: same
//! `tracing` + `tracing-subscriber` stack and json/pretty format choice,
//! without the teacher's file-rotation layer (`tracing-appender`), which
//! this binary has no deployment story for.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Initializes the global `tracing` subscriber. Call exactly once, at
/// process start, before any other logging occurs.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let default_level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    match config.format.as_str() {
        "json" => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(layer).init();
        }
        _ => {
            let layer = tracing_subscriber::fmt::layer().pretty().with_target(true).with_filter(env_filter);
            tracing_subscriber::registry().with(layer).init();
        }
    }

    Ok(())
}

fn parse_log_level(level: &str) -> Result<Level> {
    level.parse::<Level>().with_context(|| format!("invalid log level: {level}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("DEBUG").unwrap().to_string(), Level::DEBUG.to_string());
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(parse_log_level("verbose").is_err());
    }
}
