//! # Logging & Tracing Infrastructure
//!
//! One global `tracing` subscriber for the whole process, with:
//! - JSON, pretty-print and compact output formats
//! - Module-level filtering
//! - Path shortening for operator-facing output
//! - Span contexts around each sync or restore pass
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LoggingConfig::default()
//!         .with_format(LogFormat::Pretty)
//!         .with_level(LogLevel::Debug);
//!
//!     init_logging(config).expect("Failed to initialize logging");
//!
//!     tracing::info!("Starting sync");
//! }
//! ```
//!
//! Events are written to stderr so that stdout stays free for reports.

use crate::error::{Error, Result};
use bridge_traits::time::LogLevel;
use serde::Deserialize;
use std::io;
use std::str::FromStr;
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored; for a terminal
    Pretty,
    /// One JSON object per event
    Json,
    /// One line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Compact;
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Config(format!(
                "Unknown log format '{}'; expected pretty, json or compact",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for the workspace crates when no custom filter is set
    pub level: LogLevel,
    /// Show only file names instead of full paths in reports
    pub redact_paths: bool,
    /// `EnvFilter` directives replacing the default, e.g. "core_sync=debug,bridge_desktop=trace"
    pub filter: Option<String>,
    /// Emit span open/close events
    pub enable_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_paths: false,
            filter: None,
            enable_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_path_redaction(mut self, redact: bool) -> Self {
        self.redact_paths = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    /// Path as it should appear in operator-facing output
    pub fn display_path<'a>(&self, path: &'a str) -> &'a str {
        if self.redact_paths {
            strip_path(path)
        } else {
            path
        }
    }
}

/// Install the global subscriber
///
/// Only the first call in a process succeeds; later calls return
/// [`Error::Config`], as does an unparsable filter string.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    tracing_subscriber::registry()
        .with(format_layer(&config))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        // Workspace crates at the configured level, everything else at warn
        None => {
            let level = config.level.as_str();
            format!(
                "warn,glacsync={level},core_runtime={level},core_sync={level},\
                 bridge_traits={level},bridge_desktop={level}"
            )
        }
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

fn format_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let spans = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = fmt::layer()
        .with_writer(io::stderr)
        // Per-module filters are easier to tune when events show their module
        .with_target(config.filter.is_some());

    match config.format {
        LogFormat::Pretty => base.pretty().with_span_events(spans).boxed(),
        LogFormat::Compact => base.compact().with_span_events(spans).boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
    }
}

/// Final path component, for either separator
///
/// ```ignore
/// use core_runtime::logging::strip_path;
///
/// assert_eq!(strip_path("/srv/share/photos/img001.jpg"), "img001.jpg");
/// ```
pub fn strip_path(path: &str) -> &str {
    path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path)
}
