//! Extension points of the processing pipeline.

use crate::types::LogEntry;

/// Turns one raw text line into a structured log entry.
///
/// Implement this trait to support a new line format. Callers filter blank
/// lines before classification.
pub trait LineClassifier: Send + Sync {
    /// Classifier name used in logs
    fn name(&self) -> &str;

    /// Classifies `line`, attributing it to `source_name`.
    fn classify(&self, line: &str, source_name: &str) -> LogEntry;
}
