//! Logging configuration and redaction helpers as seen from outside the crate.

use bridge_traits::log::{LogLevel, MemoryLogSink};
use core_runtime::logging::{
    redact_if_sensitive, strip_path, strip_query, LogFormat, LoggingConfig,
};
use std::sync::Arc;

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_pii);
    assert!(config.filter.is_none());
    assert!(config.logger_sink.is_none());
    assert!(!config.enable_spans);
    assert!(config.display_target);

    if cfg!(debug_assertions) {
        assert_eq!(config.format, LogFormat::Pretty);
    } else {
        assert_eq!(config.format, LogFormat::Json);
    }
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_filter("core_playback=debug,core_library=trace")
        .with_pii_redaction(false)
        .with_target(false)
        .with_spans(true)
        .with_logger_sink(Arc::new(MemoryLogSink::default()));

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(
        config.filter.as_deref(),
        Some("core_playback=debug,core_library=trace")
    );
    assert!(!config.redact_pii);
    assert!(!config.display_target);
    assert!(config.enable_spans);
    assert!(config.logger_sink.is_some());
    assert!(format!("{:?}", config).contains("logger_sink: true"));
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("access_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Authorization", "Bearer x"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("cookie", "session=1"), "[REDACTED]");
}

#[test]
fn test_track_fields_pass_through() {
    assert_eq!(redact_if_sensitive("track_id", "1aB-x9_Qz"), "1aB-x9_Qz");
    assert_eq!(redact_if_sensitive("title", "Clair de Lune"), "Clair de Lune");
    assert_eq!(redact_if_sensitive("query", "moonlight"), "moonlight");
}

#[test]
fn test_download_paths_are_stripped() {
    assert_eq!(
        strip_path("/home/ana/Downloads/Moonlight Sonata.flac"),
        "Moonlight Sonata.flac"
    );
    assert_eq!(strip_path("C:\\Users\\Ana\\Downloads\\track.mp3"), "track.mp3");
    assert_eq!(strip_path("track.flac"), "track.flac");
    assert_eq!(strip_path("/var/cache/flacstore/"), "");
}

#[test]
fn test_search_terms_are_dropped_from_urls() {
    assert_eq!(
        strip_query("http://localhost:5000/api/search?q=moon%20light"),
        "http://localhost:5000/api/search"
    );
}
