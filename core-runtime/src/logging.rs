//! # Logging
//!
//! Installs the global `tracing` subscriber for the player core.
//!
//! Filtering is resolved in this order:
//!
//! 1. [`LoggingConfig::filter`] when set,
//! 2. the `FLACSTORE_LOG` environment variable,
//! 3. workspace crates at [`LoggingConfig::level`] with the HTTP stack held at `warn`.
//!
//! Events that pass the filter are printed in the chosen [`LogFormat`] and,
//! when a [`LoggerSink`] is configured, mirrored to the host as
//! [`LogRecord`]s. Mirrored fields are scrubbed: credentials are replaced,
//! local paths cut to their file name and URLs lose their query string.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;
//! tracing::info!(track_id = "f1", "Playback started");
//! ```

use crate::error::{Error, Result};

use bridge_traits::log::{LogLevel, LogRecord, LoggerSink};

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Environment variable holding a filter directive string.
pub const LOG_ENV: &str = "FLACSTORE_LOG";

const WORKSPACE_TARGETS: &[&str] = &[
    "flacstore_workspace",
    "core_runtime",
    "core_library",
    "core_playback",
    "core_service",
    "bridge_desktop",
    "bridge_traits",
    "player_cli",
];

const QUIET_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "rodio"];

const SENSITIVE_NAMES: &[&str] = &[
    "token",
    "password",
    "secret",
    "api_key",
    "authorization",
    "cookie",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. Default in debug builds.
    Pretty,
    /// One JSON object per line. Default in release builds.
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Scrub fields mirrored to the logger sink.
    pub redact_pii: bool,
    /// Explicit `EnvFilter` directives, e.g. `"core_playback=debug,reqwest=warn"`.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Print span open/close events.
    pub enable_spans: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_pii: true,
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("redact_pii", &self.redact_pii)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .finish()
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

    pub fn with_pii_redaction(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }
}

/// Install the global subscriber. Only the first call in a process succeeds.
///
/// # Errors
///
/// [`Error::Config`] when the filter does not parse or a subscriber is
/// already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let directives = filter_directives(&config, std::env::var(LOG_ENV).ok());
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("invalid log filter '{}': {}", directives, e)))?;

    tracing_subscriber::registry()
        .with(fmt_layer(&config))
        .with(SinkLayer::new(config.logger_sink.clone(), config.redact_pii))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))
}

fn fmt_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let spans = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_span_events(spans)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(false)
            .boxed(),
    }
}

fn filter_directives(config: &LoggingConfig, env: Option<String>) -> String {
    if let Some(filter) = &config.filter {
        return filter.clone();
    }
    if let Some(env) = env.filter(|value| !value.trim().is_empty()) {
        return env;
    }

    let level = config.level.as_str();
    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Sink forwarding
// ============================================================================

struct SinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl SinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>, redact: bool) -> Self {
        Self { sink, redact }
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut record = LogRecord::new(level, metadata.target(), message);
        record.fields = if self.redact {
            fields
                .values
                .into_iter()
                .map(|(name, value)| {
                    let value = scrub(&name, &value);
                    (name, value)
                })
                .collect()
        } else {
            fields.values
        };
        record.span = ctx.event_span(event).map(|span| span.name().to_string());

        let sink = Arc::clone(sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.log(record).await {
                        eprintln!("log sink rejected record: {}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = futures::executor::block_on(sink.log(record)) {
                    eprintln!("log sink rejected record: {}", e);
                }
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: BTreeMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

fn log_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::TRACE => LogLevel::Trace,
    }
}

// ============================================================================
// Redaction
// ============================================================================

fn scrub(name: &str, value: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let value = value.trim_matches('"');

    if lower == "path" || lower.ends_with("_path") || lower.ends_with("dir") {
        strip_path(value).to_string()
    } else if lower == "url" || lower.ends_with("_url") {
        strip_query(value).to_string()
    } else {
        redact_if_sensitive(name, value)
    }
}

/// Replace the value of credential-like fields with `[REDACTED]`.
///
/// ```ignore
/// info!(api_key = %redact_if_sensitive("api_key", key), "Configured endpoint");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let lower = field_name.to_ascii_lowercase();
    if SENSITIVE_NAMES.iter().any(|name| lower.contains(name)) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

/// Last component of a file path.
///
/// ```ignore
/// info!(file = %strip_path("/home/ana/Music/song.flac"), "Saved download"); // file=song.flac
/// ```
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// URL without its query string, so search terms stay out of host logs.
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
