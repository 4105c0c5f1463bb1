//! Structured logging via `tracing`.
//!
//! - Level-based filtering with per-module overrides
//! - `RUST_LOG` wins over the configured filter when set
//! - Idempotent initialization (first call wins)
//! - Spans for operation timing

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Log level for the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// `-v` count from the command line to a level
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_timestamps: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("delve_core::generation".to_string(), LogLevel::Info),
                ("delve_core::pathfinding".to_string(), LogLevel::Warn),
                ("delve_core::visibility".to_string(), LogLevel::Warn),
                ("delve_core::survey".to_string(), LogLevel::Info),
            ],
            show_timestamps: true,
            show_thread_ids: false,
            show_targets: true,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{}={}", module, level.as_str()));
        }
        parts.join(",")
    }

    /// Same filters, different default level
    pub fn with_default_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }
}

static TRACING_INIT: Once = Once::new();

/// Initialize tracing with default settings (idempotent, safe to call multiple times)
pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Initialize tracing with custom config (idempotent, first call wins)
pub fn init_tracing(config: &TracingConfig) {
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.to_env_filter_string()));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        // Ignore error if a global subscriber is already set (e.g. by a test harness)
        let _ = if config.show_timestamps {
            builder.try_init()
        } else {
            builder.without_time().try_init()
        };
    });
}

/// Create a named span for timing an operation.
/// The span closes when the guard drops.
pub struct TimingSpan {
    _span: tracing::span::EnteredSpan,
}

impl TimingSpan {
    pub fn new(name: &str) -> Self {
        let span = tracing::debug_span!("operation", name = name);
        Self {
            _span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Warn);
        assert_eq!(LogLevel::from_verbosity(2), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(7), LogLevel::Trace);
    }

    #[test]
    fn test_env_filter_string() {
        let filter = TracingConfig::default().to_env_filter_string();
        assert!(filter.starts_with("info"));
        assert!(filter.contains("delve_core::generation=info"));
        assert!(filter.contains("delve_core::visibility=warn"));
    }

    #[test]
    fn test_with_default_level() {
        let config = TracingConfig::default().with_default_level(LogLevel::Debug);
        assert!(config.to_env_filter_string().starts_with("debug"));
        assert_eq!(config.module_filters.len(), 4);
    }

    #[test]
    fn test_custom_config() {
        let config = TracingConfig {
            default_level: LogLevel::Debug,
            module_filters: vec![("my_module".to_string(), LogLevel::Trace)],
            show_timestamps: false,
            show_thread_ids: true,
            show_targets: false,
            show_file_line: true,
        };
        let filter = config.to_env_filter_string();
        assert_eq!(filter, "debug,my_module=trace");
    }

    #[test]
    fn test_init_tracing_idempotent() {
        // Should not panic when called multiple times
        init_tracing_default();
        init_tracing_default();
        init_tracing(&TracingConfig::default());
    }

    #[test]
    fn test_timing_span() {
        init_tracing_default();
        let _span = TimingSpan::new("test_operation");
        let sum: u64 = (0..100).sum();
        assert!(sum > 0);
    }
}
