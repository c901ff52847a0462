/*!
 * Tracing setup for the transfer tool
 *
 * Console reports own stdout, so human-readable logs go to stderr. A
 * `log_file` switches to JSON lines with span close events, which keeps
 * per-job timings available after a long batch.
 */

use std::fs::File;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::TransferConfig;
use crate::error::{Result, XferError};

/// Resolve the effective level, `verbose` winning over `log_level`
pub fn effective_level(config: &TransferConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// `RUST_LOG` when set, otherwise the crate at the configured level
fn session_filter(config: &TransferConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("rcxfer={}", effective_level(config))))
        .map_err(|e| XferError::Config(format!("Failed to create log filter: {}", e)))
}

/// Install the global subscriber for one run
pub fn init_logging(config: &TransferConfig) -> Result<()> {
    let filter = session_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_file {
        Some(ref log_path) => {
            let file = File::create(log_path).map_err(|e| {
                XferError::Config(format!(
                    "Failed to create log file {}: {}",
                    log_path.display(),
                    e
                ))
            })?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .json(),
                )
                .init();
        }
        None => {
            registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .without_time()
                        .compact(),
                )
                .init();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_level_from_config() {
        let config = TransferConfig {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_verbose_overrides_log_level() {
        let config = TransferConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_unwritable_log_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransferConfig {
            log_file: Some(dir.path().join("missing").join("run.log")),
            ..Default::default()
        };
        match init_logging(&config) {
            Err(XferError::Config(msg)) => assert!(msg.contains("run.log")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }
}
