//! Log subscriber setup for the `scaffolding` binary.
//!
//! Two profiles cover the commands: one-shot queries log only warnings on a
//! single compact line, while a room host logs lifecycle events with
//! timestamps and emits a close event for every request span so handler
//! timings show up. `RUST_LOG` always wins over the profile's level.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::Layered,
    prelude::*,
};

type FmtLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Target prefix shared by every crate in the workspace.
pub const DEFAULT_TARGET: &str = "scaffolding";

/// Errors from [`init_tracing`].
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One human-readable line per event.
    #[default]
    Text,
    /// One JSON object per line, for log collectors.
    Json,
}

/// Logging profile for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub level: Level,
    pub format: LogFormat,
    pub timestamps: bool,
    /// Emit an event when a span closes, carrying its busy/idle time.
    pub span_timings: bool,
    /// Add file and line to every event.
    pub source_location: bool,
}

impl TracingConfig {
    /// Profile for one-shot client commands: warnings only, no timestamps.
    #[must_use]
    pub fn query() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Text,
            timestamps: false,
            span_timings: false,
            source_location: false,
        }
    }

    /// Profile for hosting a room.
    #[must_use]
    pub fn host() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            timestamps: true,
            span_timings: true,
            source_location: false,
        }
    }

    /// Raises the level to DEBUG and adds source locations.
    #[must_use]
    pub fn verbose(mut self) -> Self {
        self.level = Level::DEBUG;
        self.source_location = true;
        self
    }

    /// Switches output to JSON lines.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        format!("{}={}", DEFAULT_TARGET, self.level.as_str().to_ascii_lowercase())
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.directive())?),
        }
    }

    fn layer(&self) -> FmtLayer {
        let spans = if self.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_span_events(spans);

        match (self.format, self.timestamps) {
            (LogFormat::Text, true) => base.compact().boxed(),
            (LogFormat::Text, false) => base.compact().without_time().boxed(),
            (LogFormat::Json, true) => base.json().boxed(),
            (LogFormat::Json, false) => base.json().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once, early in `main`.
///
/// # Errors
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let subscriber = tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(config.layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
