//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Level filter.
    pub filter: EnvFilter,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Clone for LoggingConfig {
    fn clone(&self) -> Self {
        Self {
            format: self.format,
            filter: EnvFilter::new(self.filter.to_string()),
            file: self.file.clone(),
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// The filter comes from `CAREWATCH_LOG`, then `RUST_LOG`, then `debug` when
    /// verbose, then the file's `level`, then `info`.
    /// `CAREWATCH_LOG_FORMAT` wins over the file's `format`.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::from_lookup(settings, verbose, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        settings: Option<&LoggingSettings>,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let directive = lookup("CAREWATCH_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|v| !v.trim().is_empty())
            .or_else(|| verbose.then(|| "debug".to_string()))
            .or_else(|| settings.and_then(|s| s.level.clone()))
            .unwrap_or_else(|| "info".to_string());
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
            eprintln!("Ignoring invalid log filter '{directive}': {e}");
            EnvFilter::new("info")
        });

        let format = lookup("CAREWATCH_LOG_FORMAT")
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .and_then(|f| LogFormat::parse(&f))
            .unwrap_or_default();

        let file = settings
            .and_then(|s| s.file.as_deref())
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(PathBuf::from);

        Self {
            format,
            filter,
            file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::from_lookup(None, false, |_| None);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter.to_string(), "info");
        assert!(config.file.is_none());

        let config = LoggingConfig::from_lookup(None, true, |_| None);
        assert_eq!(config.filter.to_string(), "debug");
    }

    #[test]
    fn test_env_beats_file() {
        let settings = LoggingSettings {
            level: Some("info".to_string()),
            format: Some("pretty".to_string()),
            file: Some("/tmp/carewatch.log".to_string()),
        };
        let config = LoggingConfig::from_lookup(Some(&settings), false, |key| match key {
            "CAREWATCH_LOG" => Some("carewatch=trace".to_string()),
            "CAREWATCH_LOG_FORMAT" => Some("json".to_string()),
            _ => None,
        });
        assert_eq!(config.filter.to_string(), "carewatch=trace");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/carewatch.log")));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
