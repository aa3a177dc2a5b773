//! Logging support.
//!
//! Structured logging through `tracing`, with a small configuration layer
//! shared by the container entrypoint and the external runner.

pub use tracing::{self, debug, error, info, trace, warn};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding an explicit filter (e.g. `dockwrap=trace`)
pub const LOG_ENV: &str = "DOCKWRAP_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human-readable output (default).
    #[default]
    Compact,

    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Lower the default level from `info` to `debug`.
    ///
    /// Ignored when [`LOG_ENV`] is set.
    pub debug: bool,

    /// Output format.
    pub format: LogFormat,

    /// Include target module names in output.
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            format: LogFormat::Compact,
            target: true,
        }
    }
}

impl LogConfig {
    /// Default configuration with the debug level toggled.
    pub fn with_debug(debug: bool) -> Self {
        Self {
            debug,
            ..Default::default()
        }
    }

    /// Filter to install: [`LOG_ENV`] if set and valid, else the level
    /// implied by [`LogConfig::debug`].
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
            EnvFilter::new(if self.debug { "debug" } else { "info" })
        })
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Stdout stays free for program output. Calling this more than once keeps
/// the first subscriber.
pub fn init_logging(config: &LogConfig) {
    let filter = config.filter();

    let result = match config.format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .without_time()
                    .with_target(config.target)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(config.target)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.debug);
        assert!(config.target);
    }

    #[test]
    fn test_with_debug() {
        assert!(LogConfig::with_debug(true).debug);
    }

    #[test]
    fn test_init_twice() {
        init_logging(&LogConfig::default());
        init_logging(&LogConfig::with_debug(true));
    }
}
