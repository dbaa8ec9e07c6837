//! Logging setup for the `strata` binary.
//!
//! Logs always go to stderr so that command output on stdout stays
//! machine-readable. The level comes from `-v` flags; `STRATA_LOG` adds
//! per-crate directives on top, in `EnvFilter` syntax.

use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as layer_fmt};

use crate::error::{TelemetryError, TelemetryResult};

/// Environment variable holding extra filter directives.
pub const LOG_ENV: &str = "STRATA_LOG";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event.
    #[default]
    Compact,
    /// Multi-line, with source locations.
    Pretty,
    /// Newline-delimited JSON with timestamps.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(TelemetryError::UnknownFormat(s.to_owned())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default level for every target.
    pub level: LevelFilter,
    /// Line format.
    pub format: LogFormat,
    /// Use ANSI colours in the compact and pretty formats.
    pub ansi: bool,
    /// Extra directives such as `strata_config::merge=trace`.
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LevelFilter::WARN)
    }
}

impl LogConfig {
    /// A compact, coloured configuration at `level`.
    #[must_use]
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            format: LogFormat::Compact,
            ansi: true,
            directives: Vec::new(),
        }
    }

    /// Level for a `-v` count: none is `warn`, then `info`, `debug`, `trace`.
    #[must_use]
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        Self::new(level)
    }

    /// Set the line format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add one directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Add the comma-separated directives of [`LOG_ENV`], if set.
    #[must_use]
    pub fn with_env_directives(self) -> Self {
        let value = std::env::var(LOG_ENV).ok();
        self.with_directive_list(value.as_deref())
    }

    fn with_directive_list(mut self, list: Option<&str>) -> Self {
        if let Some(list) = list {
            self.directives.extend(
                list.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_owned),
            );
        }
        self
    }

    /// Disable ANSI colours.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .parse_lossy("");

        for directive in &self.directives {
            let parsed = directive
                .parse()
                .map_err(|e: tracing_subscriber::filter::ParseError| {
                    TelemetryError::InvalidFilter {
                        directive: directive.clone(),
                        message: e.to_string(),
                    }
                })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install the global subscriber.
///
/// Compact and pretty lines carry no timestamps; JSON lines do.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a bad directive and
/// [`TelemetryError::Init`] if a subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let registry = tracing_subscriber::registry().with(config.filter()?);
    let layer = layer_fmt::layer().with_writer(std::io::stderr);

    match config.format {
        LogFormat::Compact => registry
            .with(layer.compact().with_ansi(config.ansi).without_time())
            .try_init(),
        LogFormat::Pretty => registry
            .with(layer.pretty().with_ansi(config.ansi).without_time())
            .try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    }
    .map_err(|e| TelemetryError::Init(e.to_string()))
}
