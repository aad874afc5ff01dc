use crate::config::AppConfig;
use crate::error::{IcdError, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber.
///
/// `RUST_LOG` wins over the configured level. With a log file configured,
/// output is appended there without ANSI colours; otherwise (or when the
/// path is "-") it goes to stderr.
pub fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| IcdError::Configuration {
            message: format!("invalid log level '{}': {}", config.log_level, e),
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match log_target(config) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| IcdError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| IcdError::Configuration {
        message: format!("failed to install log subscriber: {}", e),
    })
}

/// Log file to append to, or `None` for stderr
fn log_target(config: &AppConfig) -> Option<&Path> {
    config.log_file.as_deref().filter(|p| *p != Path::new("-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_log_target_dash_means_stderr() {
        let mut config = AppConfig {
            log_file: Some(PathBuf::from("-")),
            ..AppConfig::default()
        };
        assert_eq!(log_target(&config), None);

        config.log_file = None;
        assert_eq!(log_target(&config), None);

        config.log_file = Some(PathBuf::from("app.log"));
        assert_eq!(log_target(&config), Some(Path::new("app.log")));
    }

    // The only test in this crate that installs the global subscriber
    #[test]
    fn test_init_logging_writes_to_file_and_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("app.log");
        let config = AppConfig {
            log_file: Some(log_path.clone()),
            log_level: "info".to_string(),
            ..AppConfig::default()
        };

        init_logging(&config).unwrap();
        assert!(log_path.exists());

        tracing::warn!("logging smoke entry");
        if std::env::var("RUST_LOG").is_err() {
            let contents = std::fs::read_to_string(&log_path).unwrap();
            assert!(contents.contains("logging smoke entry"));
            // File output carries no ANSI escapes
            assert!(!contents.contains('\u{1b}'));
        }

        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, IcdError::Configuration { .. }));
    }
}
