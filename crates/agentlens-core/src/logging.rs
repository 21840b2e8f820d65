//! Scan diagnostics collector.
//!
//! Provides a [`DiagnosticCollector`] that captures `WARN` and `ERROR`
//! events into a bounded ring buffer, together with the `file` field the
//! scanner attaches to per-file problems, and a [`DiagnosticReader`] handle
//! the CLI uses to print a summary after a scan.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A single captured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    /// Target module path.
    pub target: String,
    /// The `file` field of the event, when present.
    pub file: Option<String>,
    /// The formatted message.
    pub message: String,
}

#[derive(Debug)]
struct DiagnosticBuffer {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
    dropped: usize,
}

impl DiagnosticBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(diagnostic);
    }
}

/// A `tracing` layer that keeps the most recent warnings and errors.
#[derive(Debug, Clone)]
pub struct DiagnosticCollector {
    buffer: Arc<Mutex<DiagnosticBuffer>>,
}

impl DiagnosticCollector {
    /// Create a new collector with the given ring buffer capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(DiagnosticBuffer::new(capacity))),
        }
    }

    /// Get a reader handle for the captured diagnostics.
    pub fn reader(&self) -> DiagnosticReader {
        DiagnosticReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // More verbose levels compare greater.
        if *metadata.level() > Level::WARN {
            return;
        }

        let mut visitor = DiagnosticVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(Diagnostic {
                level: *metadata.level(),
                target: metadata.target().to_string(),
                file: visitor.file,
                message: visitor.message,
            });
        }
    }
}

/// A read handle for the diagnostic buffer.
#[derive(Debug, Clone)]
pub struct DiagnosticReader {
    buffer: Arc<Mutex<DiagnosticBuffer>>,
}

impl DiagnosticReader {
    /// Snapshot of the captured diagnostics, oldest first.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.buffer
            .lock()
            .map(|buf| buf.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of diagnostics evicted because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.buffer.lock().map(|buf| buf.dropped).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Visitor that extracts the `message` and `file` fields.
#[derive(Default)]
struct DiagnosticVisitor {
    message: String,
    file: Option<String>,
}

impl Visit for DiagnosticVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "file" => self.file = Some(format!("{value:?}")),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "file" => self.file = Some(value.to_string()),
            _ => {}
        }
    }
}
