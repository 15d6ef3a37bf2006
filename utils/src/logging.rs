//! Structured logging initialisation.
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: coloured, human-readable lines (development).
//! - [`LogFormat::Json`]: newline-delimited JSON (production / log aggregation).
//!
//! The filter level can be overridden at runtime via the `RUST_LOG`
//! environment variable. When `RUST_LOG` is not set, the caller-supplied
//! `level` string is used (e.g. `"info"`, `"debug,liquid_node=trace"`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Selects the output format for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty-printed, coloured output for local development.
    #[default]
    Human,
    /// Newline-delimited JSON for production and log aggregation pipelines.
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log format `{0}` (expected `human` or `json`)")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Human => "human",
            Self::Json => "json",
        })
    }
}

/// Initialise the global tracing subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set (i.e. this function
/// was called twice in the same process).
pub fn init_logging(format: LogFormat, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Human => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tfmt::layer().with_target(true).with_thread_ids(true))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tfmt::layer().json().with_target(true).with_thread_ids(true))
                .init();
        }
    }
    tracing::debug!(%format, level, "logging initialised");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn display_matches_parse() {
        for format in [LogFormat::Human, LogFormat::Json] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }
}
