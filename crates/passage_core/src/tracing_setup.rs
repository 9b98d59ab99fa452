//! Subscriber installation for `passage` binaries.
//!
//! The engine logs through `tracing`: one `debug` span per `propagate` call,
//! a `debug` event whenever a strategy is derived and a `warn` event on a
//! failed call. [`TracingSetup`] installs a `tracing_subscriber` registry
//! that renders them.
//!
//! # Example
//!
//! ```
//! use passage_core::{TracingFormat, TracingSetup};
//! use tracing::Level;
//!
//! // Development: readable output with span enter/exit
//! let dev = TracingSetup::default()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Pretty)
//!     .with_span_events(true);
//!
//! // Production: JSON lines, engine details only
//! let prod = TracingSetup::default()
//!     .with_format(TracingFormat::Json)
//!     .with_env_filter("passage_engine=debug,warn");
//!
//! assert_eq!(prod.level(), Level::INFO);
//! # let _ = dev;
//! ```

use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while configuring or installing the subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// The settings document is not valid JSON or has unknown fields.
    #[error("invalid tracing settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// The level name is not one of `trace`, `debug`, `info`, `warn`, `error`.
    #[error("invalid tracing level `{0}`")]
    Level(String),

    /// The filter directive string does not parse.
    #[error("invalid env filter `{directives}`: {reason}")]
    Filter {
        /// The rejected directives.
        directives: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber was installed earlier in this process.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingSetup
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for the process-wide `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct TracingSetup {
    /// Maximum log level, used when no filter is given.
    level: Level,
    /// Output format.
    format: TracingFormat,
    /// Directive string such as `"passage_engine=debug,warn"`.
    env_filter: Option<String>,
    /// Whether to include span enter/exit events.
    span_events: bool,
}

impl Default for TracingSetup {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    format: Option<TracingFormat>,
    #[serde(default)]
    env_filter: Option<String>,
    #[serde(default)]
    span_events: Option<bool>,
}

impl TracingSetup {
    /// Creates a setup with default settings: `INFO`, pretty, no span events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads settings from a JSON object.
    ///
    /// Every key is optional:
    ///
    /// ```
    /// use passage_core::{TracingFormat, TracingSetup};
    ///
    /// let setup = TracingSetup::from_json(r#"{ "level": "debug", "format": "json" }"#).unwrap();
    /// assert_eq!(setup.format(), TracingFormat::Json);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, TracingError> {
        let settings: Settings = serde_json::from_str(json)?;
        let mut setup = Self::default();
        if let Some(level) = settings.level {
            setup.level = Level::from_str(&level).map_err(|_| TracingError::Level(level))?;
        }
        if let Some(format) = settings.format {
            setup.format = format;
        }
        setup.env_filter = settings.env_filter;
        if let Some(span_events) = settings.span_events {
            setup.span_events = span_events;
        }
        Ok(setup)
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a directive string, which takes precedence over the level.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the configured format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    /// Builds the filter from the directive string, or from the level when
    /// none was given.
    pub fn filter(&self) -> Result<EnvFilter, TracingError> {
        match &self.env_filter {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingError::Filter {
                    directives: directives.clone(),
                    reason: err.to_string(),
                })
            }
            None => Ok(EnvFilter::new(self.level.as_str())),
        }
    }

    /// Installs the subscriber as the global default.
    ///
    /// Fails with [`TracingError::AlreadyInstalled`] when another subscriber
    /// got there first; callers that do not care can ignore that variant.
    pub fn init(&self) -> Result<(), TracingError> {
        let filter = self.filter()?;
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            TracingFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init(),
        };
        installed.map_err(|_| TracingError::AlreadyInstalled)?;

        tracing::info!(
            level = %self.level,
            format = ?self.format,
            "tracing initialized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pretty_info() {
        let setup = TracingSetup::default();
        assert_eq!(setup.format(), TracingFormat::Pretty);
        assert_eq!(setup.level(), Level::INFO);
        assert!(!setup.span_events);
    }

    #[test]
    fn builder_sets_fields() {
        let setup = TracingSetup::new()
            .with_level(Level::DEBUG)
            .with_format(TracingFormat::Compact)
            .with_env_filter("passage_engine=trace")
            .with_span_events(true);
        assert_eq!(setup.level(), Level::DEBUG);
        assert_eq!(setup.format(), TracingFormat::Compact);
        assert_eq!(setup.env_filter.as_deref(), Some("passage_engine=trace"));
        assert!(setup.span_events);
    }

    #[test]
    fn from_json_reads_every_key() {
        let setup = TracingSetup::from_json(
            r#"{ "level": "warn", "format": "json", "env_filter": "passage=debug", "span_events": true }"#,
        )
        .unwrap();
        assert_eq!(setup.level(), Level::WARN);
        assert_eq!(setup.format(), TracingFormat::Json);
        assert_eq!(setup.env_filter.as_deref(), Some("passage=debug"));
        assert!(setup.span_events);
    }

    #[test]
    fn from_json_empty_object_is_default() {
        let setup = TracingSetup::from_json("{}").unwrap();
        assert_eq!(setup.level(), Level::INFO);
        assert_eq!(setup.format(), TracingFormat::Pretty);
    }

    #[test]
    fn from_json_rejects_unknown_level() {
        let err = TracingSetup::from_json(r#"{ "level": "loud" }"#).unwrap_err();
        assert!(matches!(err, TracingError::Level(ref level) if level == "loud"));
    }

    #[test]
    fn from_json_rejects_unknown_field() {
        let err = TracingSetup::from_json(r#"{ "colour": true }"#).unwrap_err();
        assert!(matches!(err, TracingError::Settings(_)));
    }

    #[test]
    fn invalid_filter_is_reported() {
        let setup = TracingSetup::new().with_env_filter("passage_engine=loud");
        let err = setup.filter().unwrap_err();
        assert!(err.to_string().contains("passage_engine=loud"), "got: {err}");
    }

    #[test]
    fn second_init_reports_already_installed() {
        let setup = TracingSetup::new().with_level(Level::ERROR);
        // Other tests in this binary may have installed one already.
        let _ = setup.init();
        assert!(matches!(setup.init(), Err(TracingError::AlreadyInstalled)));
    }
}
