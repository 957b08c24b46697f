//! This module provides logging and diagnostics hooks for the analytics engine.
//!
//! The engine logs through the `log` facade. `init_logging` installs an
//! `env_logger` backend once per process; embedders that bring their own logger
//! simply never call it. The `checkpoint!` macro emits structured key/value
//! trace records and is compiled out of release builds.

use std::fs::OpenOptions;
use std::sync::Once;

use log::LevelFilter;

use crate::config::LogConfig;
use crate::error::AnalyticsError;

static INIT_LOGGER: Once = Once::new();

/// Logs a structured key/value record at trace level, only in debug builds.
///
/// # Example
/// ```
/// use tambak_analytics::checkpoint;
/// let elements = 128;
/// checkpoint!("event" = "unpack", "elements" = elements);
/// ```
#[macro_export]
macro_rules! checkpoint {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::trace!("CHECKPOINT: {{ {} }}", parts.join(", "));
        }
    };
}

fn parse_level(level: &str) -> Result<LevelFilter, AnalyticsError> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| AnalyticsError::InvalidParam(format!("unknown log level '{}'", level)))
}

/// Installs the process-wide `env_logger` backend described by `config`.
///
/// Only the first call has an effect. A logger installed by someone else is
/// left in place.
pub fn init_logging(config: &LogConfig) -> Result<(), AnalyticsError> {
    let level = parse_level(&config.level)?;
    let file = match &config.file {
        Some(path) => Some(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .map_err(|e| AnalyticsError::InvalidParam(format!("log file '{}': {}", path, e)))?,
        ),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);

        // Custom formatter: just print the level, target and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_level_is_rejected() {
        let config = LogConfig { level: "chatty".to_string(), file: None };
        assert!(matches!(init_logging(&config), Err(AnalyticsError::InvalidParam(_))));
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        let config = LogConfig::default();
        init_logging(&config).unwrap();
        init_logging(&config).unwrap();
        checkpoint!("event" = "test", "value" = 1);
    }
}
