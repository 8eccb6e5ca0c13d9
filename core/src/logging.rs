//! Structured logging ambient stack: a `Severity` scale one level richer
//! than `tracing`'s own, a `Sink` capability trait, and a `LogAggregator`
//! that reads a JSON settings file mapping sinks to minimum severities.
//!
//! The core itself never calls into this module directly — it emits
//! `tracing` events at the call site (see `StoragePeer`/`Router`) — this is
//! the collector a process wires up once at startup.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Severity scale, ordered least to most severe. `tracing` only has five
/// levels; `CRITICAL` is the sixth, reserved for structural invariant
/// violations that abort the owning process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum Severity {
    #[serde(rename = "TRACE")]
    Trace,
    #[serde(rename = "DEBUG")]
    Debug,
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl From<Severity> for tracing::Level {
    fn from(sev: Severity) -> Self {
        match sev {
            Severity::Trace => tracing::Level::TRACE,
            Severity::Debug => tracing::Level::DEBUG,
            Severity::Info => tracing::Level::INFO,
            Severity::Warning => tracing::Level::WARN,
            // CRITICAL has no tracing counterpart; it renders at the
            // highest level tracing offers so it is never filtered out
            // ahead of a process exit.
            Severity::Error | Severity::Critical => tracing::Level::ERROR,
        }
    }
}

/// An append target for log events. Implementations are distinct concrete
/// types rather than a class hierarchy.
pub trait Sink {
    fn emit(&mut self, level: Severity, message: &str);
}

/// Writes to stdout via `tracing`, so console output interleaves correctly
/// with any other `tracing` subscriber the process has installed.
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn emit(&mut self, level: Severity, message: &str) {
        match tracing::Level::from(level) {
            tracing::Level::TRACE => tracing::trace!("{message}"),
            tracing::Level::DEBUG => tracing::debug!("{message}"),
            tracing::Level::INFO => tracing::info!("{message}"),
            tracing::Level::WARN => tracing::warn!("{message}"),
            tracing::Level::ERROR => tracing::error!("{message}"),
        }
    }
}

/// Appends one line per event to a file, reopened once at construction and
/// kept for the sink's lifetime.
pub struct FileSink {
    path: PathBuf,
    file: std::fs::File,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_owned();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }
}

impl Sink for FileSink {
    fn emit(&mut self, level: Severity, message: &str) {
        if writeln!(self.file, "[{level:?}] {message}").is_err() {
            tracing::warn!(path = %self.path.display(), "log sink write failed");
        }
    }
}

/// One entry of the log settings file: a sink target (`"console"` or a
/// filesystem path) mapped to its minimum severity.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct LogSettings(HashMap<String, Severity>);

impl LogSettings {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Severity)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

struct Route {
    sink: Box<dyn Sink + Send>,
    min_severity: Severity,
}

/// Collects events from every `Sink::emit` call site in the process and
/// fans each one out to every configured sink whose minimum severity it
/// meets.
#[derive(Default)]
pub struct LogAggregator {
    routes: Vec<Route>,
}

impl LogAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, sink: Box<dyn Sink + Send>, min_severity: Severity) {
        self.routes.push(Route { sink, min_severity });
    }

    /// Build an aggregator from a parsed settings file, opening a
    /// `ConsoleSink` for the `"console"` key and a `FileSink` for every
    /// other key (treated as a filesystem path).
    pub fn from_settings(settings: &LogSettings) -> std::io::Result<Self> {
        let mut agg = Self::new();
        for (target, min_severity) in settings.entries() {
            if target == "console" {
                agg.add_route(Box::new(ConsoleSink), min_severity);
            } else {
                agg.add_route(Box::new(FileSink::open(target)?), min_severity);
            }
        }
        Ok(agg)
    }

    pub fn emit(&mut self, level: Severity, message: &str) {
        for route in &mut self.routes {
            if level >= route.min_severity {
                route.sink.emit(level, message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_declared_scale() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn critical_maps_to_tracing_error() {
        assert_eq!(tracing::Level::from(Severity::Critical), tracing::Level::ERROR);
    }

    #[test]
    fn aggregator_filters_below_minimum_severity() {
        let mut agg = LogAggregator::new();
        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        struct SharedSink(std::sync::Arc<std::sync::Mutex<Vec<(Severity, String)>>>);
        impl Sink for SharedSink {
            fn emit(&mut self, level: Severity, message: &str) {
                self.0.lock().unwrap().push((level, message.to_owned()));
            }
        }
        agg.add_route(Box::new(SharedSink(events.clone())), Severity::Warning);
        agg.emit(Severity::Info, "should be filtered");
        agg.emit(Severity::Error, "should pass");
        let recorded = events.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].1, "should pass");
    }

    #[test]
    fn settings_parse_console_and_path_targets() {
        let json = r#"{"console": "INFO", "/tmp/shardmap-test.log": "CRITICAL"}"#;
        let settings = LogSettings::from_json(json).unwrap();
        let mut seen: Vec<_> = settings.entries().collect();
        seen.sort_by(|a, b| a.0.cmp(b.0));
        assert_eq!(seen.len(), 2);
    }
}
