//! Structured diagnostics emitted by the extraction and generation pipeline
//!
//! Components never talk to a UI or console directly. They hand events to a
//! [`DiagnosticSink`], and whoever owns the pipeline decides where they go.

use std::sync::Mutex;
use tracing::Level;

/// Receiver for diagnostic events
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, level: Level, message: &str, details: Option<&str>);
}

/// Forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, level: Level, message: &str, details: Option<&str>) {
        let details = details.unwrap_or_default();
        match level {
            Level::ERROR => tracing::error!(details, "{message}"),
            Level::WARN => tracing::warn!(details, "{message}"),
            Level::INFO => tracing::info!(details, "{message}"),
            Level::DEBUG => tracing::debug!(details, "{message}"),
            Level::TRACE => tracing::trace!(details, "{message}"),
        }
    }
}

/// A recorded diagnostic event
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticEvent {
    pub level: Level,
    pub message: String,
    pub details: Option<String>,
}

/// Buffers events in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn events_at(&self, level: Level) -> Vec<DiagnosticEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&self, level: Level, message: &str, details: Option<&str>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(DiagnosticEvent {
                level,
                message: message.to_string(),
                details: details.map(str::to_string),
            });
        }
    }
}
