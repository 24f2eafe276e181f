//! In-memory capture of tracing events for the log pane.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tracing_subscriber::Layer;

/// Lines kept before the oldest are dropped.
const MAX_LOG_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

/// Shared ring of recent log lines.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<LogLine>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: LogLine) {
        let mut lines = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() >= MAX_LOG_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    /// Up to `height` lines ending `scroll` lines before the newest, oldest first.
    pub fn window(&self, height: usize, scroll: usize) -> Vec<LogLine> {
        let Ok(lines) = self.inner.lock() else {
            return Vec::new();
        };
        let end = lines.len().saturating_sub(scroll);
        let start = end.saturating_sub(height);
        lines.range(start..end).cloned().collect()
    }

    /// Number of warnings and errors currently held.
    pub fn problem_count(&self) -> usize {
        self.inner
            .lock()
            .map(|lines| lines.iter().filter(|l| l.level >= LogLevel::Warn).count())
            .unwrap_or(0)
    }
}

/// Tracing layer feeding a [`LogBuffer`].
pub struct LogBufferLayer {
    buffer: LogBuffer,
}

impl LogBufferLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogBufferLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.buffer.push(LogLine {
            at: Local::now(),
            level: metadata.level().into(),
            target: metadata.target().to_string(),
            message: visitor.finish(),
        });
    }
}

/// Collects the message plus any extra fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.join(" ")
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn line(message: &str, level: LogLevel) -> LogLine {
        LogLine {
            at: Local::now(),
            level,
            target: "node_ui".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let buffer = LogBuffer::new();
        for i in 0..MAX_LOG_LINES + 10 {
            buffer.push(line(&format!("m{}", i), LogLevel::Info));
        }
        assert_eq!(buffer.len(), MAX_LOG_LINES);
        assert_eq!(buffer.window(1, MAX_LOG_LINES - 1)[0].message, "m10");
    }

    #[test]
    fn test_window_scrolls_back_from_newest() {
        let buffer = LogBuffer::new();
        for i in 0..10 {
            buffer.push(line(&format!("m{}", i), LogLevel::Info));
        }
        let newest: Vec<String> = buffer.window(3, 0).into_iter().map(|l| l.message).collect();
        assert_eq!(newest, vec!["m7", "m8", "m9"]);
        let older: Vec<String> = buffer.window(3, 5).into_iter().map(|l| l.message).collect();
        assert_eq!(older, vec!["m2", "m3", "m4"]);
        assert!(buffer.window(3, 50).is_empty());
    }

    #[test]
    fn test_problem_count() {
        let buffer = LogBuffer::new();
        buffer.push(line("ok", LogLevel::Info));
        buffer.push(line("hmm", LogLevel::Warn));
        buffer.push(line("bad", LogLevel::Error));
        assert_eq!(buffer.problem_count(), 2);
    }

    #[test]
    fn test_layer_captures_message_and_fields() {
        let buffer = LogBuffer::new();
        let subscriber =
            tracing_subscriber::registry().with(LogBufferLayer::new(buffer.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(round = 42, "Tail retry");
        });
        let lines = buffer.window(10, 0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, LogLevel::Warn);
        assert_eq!(lines[0].message, "Tail retry round=42");
    }
}
