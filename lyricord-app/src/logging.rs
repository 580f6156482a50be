use lyricord_core::LyricordConfig;
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,rspotify_http=warn";

/// Whether `[logging] enabled = true` is set in the config file.
///
/// Read before the full config load so tracing is up first. A missing or
/// unparsable file means no file logging.
pub fn file_logging_enabled() -> bool {
    std::fs::read_to_string(LyricordConfig::config_path())
        .is_ok_and(|content| file_logging_enabled_in(&content))
}

fn file_logging_enabled_in(content: &str) -> bool {
    // Only the logging table is read; everything else may still be invalid
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    toml::from_str::<PartialConfig>(content).is_ok_and(|c| c.logging.enabled)
}

/// Initialize tracing with console output and optional file logging
pub fn init_tracing(file_logging: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = tracing_subscriber::fmt::layer();

    let file_layer = file_logging.then(open_log_file).flatten().map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
    });

    // Option<Layer> is a no-op layer when None
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(file_layer)
        .init();
}

fn open_log_file() -> Option<File> {
    let log_path = lyricord_core::log_file_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match File::create(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Failed to create log file at {}: {e}", log_path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_flag() {
        assert!(file_logging_enabled_in("[logging]\nenabled = true\n"));
        assert!(!file_logging_enabled_in("[logging]\nenabled = false\n"));
        assert!(!file_logging_enabled_in("[spotify]\nclient_id = \"x\"\n"));
    }

    #[test]
    fn test_file_logging_ignores_unrelated_errors() {
        let content = "[spotify]\npoll_interval_ms = \"oops\"\n[logging]\nenabled = true\n";
        assert!(file_logging_enabled_in(content));
        assert!(!file_logging_enabled_in("[logging\nenabled = true"));
    }
}
