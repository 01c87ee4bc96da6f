use log::Level;
use std::sync::Mutex;

/// Destination for advisory diagnostics. Implementations must never panic and
/// must not influence the caller in any way.
pub trait AdvisorySink: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards advisories to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AdvisorySink for LogSink {
    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

/// Keeps every advisory in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.with_level(Level::Warn)
    }

    pub fn errors(&self) -> Vec<String> {
        self.with_level(Level::Error)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn with_level(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

impl AdvisorySink for RecordingSink {
    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_splits_levels() {
        let sink = RecordingSink::new();
        sink.warn("first");
        sink.error("second");
        sink.warn("third");

        assert_eq!(sink.warnings(), ["first", "third"]);
        assert_eq!(sink.errors(), ["second"]);
        assert_eq!(sink.entries().len(), 3);

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_log_sink_does_not_panic() {
        LogSink.warn("careful");
        LogSink.error("broken");
    }
}
