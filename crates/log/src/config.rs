//! Configuration types and presets

use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level filter (e.g., "info", "debug,nebula_storage=trace")
    pub level: String,

    /// Output format
    pub format: Format,

    /// Colored output
    pub ansi: bool,

    /// Show timestamps
    pub time: bool,

    /// Show target module
    pub target: bool,

    /// Show source location (file:line)
    pub source: bool,

    /// Route output through the test harness capture
    pub test_writer: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable with colors and indentation
    Pretty,
    /// Compact single-line output
    #[default]
    Compact,
    /// Structured JSON output
    Json,
}

impl Format {
    /// Parse a format name; unknown names fall back to [`Format::Compact`]
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            ansi: true,
            time: true,
            target: true,
            source: false,
            test_writer: false,
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    ///
    /// The filter comes from `NEBULA_LOG`, then `RUST_LOG`; the format from
    /// `NEBULA_LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("NEBULA_LOG") {
            config.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }

        if let Ok(format) = std::env::var("NEBULA_LOG_FORMAT") {
            config.format = Format::from_name(&format);
            config.ansi = config.format != Format::Json;
        }

        config
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            source: true,
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            ansi: false,
            ..Self::default()
        }
    }

    /// Test configuration (captured by the test harness)
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "trace".to_string(),
            format: Format::Compact,
            ansi: false,
            time: false,
            test_writer: true,
            ..Self::default()
        }
    }

    /// Replace the level filter
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Replace the output format
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}
