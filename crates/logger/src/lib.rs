//! Tracing subscriber setup shared by the Vigil binaries.

use std::env::var;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer,
    filter::EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Read the format from `RUST_LOG_FORMAT`, falling back to compact output
    pub fn from_env() -> Self {
        match var("RUST_LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global subscriber with the format from the environment and `info` as the default
/// level.
pub fn init() -> Result<(), TryInitError> {
    init_with(LogFormat::from_env(), LevelFilter::INFO)
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives take precedence over `level`.
pub fn init_with(format: LogFormat, level: LevelFilter) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_compact() {
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }
}
