//! Logger setup.
//!
//! Everything logs through the `log` facade. The binary installs a
//! `simplelog` terminal logger, plus a file logger when `--log-file` is given.

use std::fmt;
use std::fs::File;
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Chatty dependencies, silenced unless the level is `trace`.
const FILTERED_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "axum", "tower", "h2"];

#[derive(Debug)]
pub enum LoggingError {
    File(std::io::Error),
    AlreadyInitialized,
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::File(e) => write!(f, "cannot open log file: {e}"),
            LoggingError::AlreadyInitialized => write!(f, "logger already initialized"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Parses a level name (`info`, `DEBUG`, ...), falling back to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Info)
}

fn build_log_config(level: LevelFilter) -> simplelog::Config {
    let mut builder = ConfigBuilder::new();
    builder.set_time_format_rfc3339();
    if level != LevelFilter::Trace {
        for module in FILTERED_MODULES {
            builder.add_filter_ignore_str(module);
        }
    }
    builder.build()
}

pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        build_log_config(level),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = File::create(path).map_err(LoggingError::File)?;
        // The file always gets debug detail, whatever the terminal shows.
        let file_level = level.max(LevelFilter::Debug);
        loggers.push(WriteLogger::new(file_level, build_log_config(file_level), file));
    }

    CombinedLogger::init(loggers).map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_filtered_modules_cover_http_stack() {
        for module in ["hyper", "reqwest", "axum", "tower"] {
            assert!(FILTERED_MODULES.contains(&module), "{module} should be filtered");
        }
    }

    #[test]
    fn test_missing_log_directory_is_an_error() {
        let result = init_logging(LevelFilter::Info, Some(Path::new("/nonexistent/dir/minutai.log")));
        assert!(matches!(result, Err(LoggingError::File(_))));
    }
}
