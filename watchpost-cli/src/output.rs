//! Output formatting for text vs JSON rendering
//!
//! All command output flows through [`OutputWriter`], which handles format
//! switching. Command handlers never branch on the format themselves.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use watchpost_core::types::{AlertSeverity, LogLevel};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads to stdout in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload)
    }

    /// Render a payload to `w`.
    ///
    /// `Text` delegates to [`Render::render_text`]; `Json` serialises via
    /// `serde_json`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// Level name colored by urgency.
pub fn level_label(level: LogLevel) -> String {
    let name = format!("{:<8}", level.as_str());
    match level {
        LogLevel::Critical => name.red().bold().to_string(),
        LogLevel::Error => name.red().to_string(),
        LogLevel::Warning => name.yellow().to_string(),
        LogLevel::Info => name.green().to_string(),
        LogLevel::Debug => name.dimmed().to_string(),
    }
}

/// Severity name colored by urgency.
pub fn severity_label(severity: AlertSeverity) -> String {
    let name = format!("{:<8}", severity.as_str());
    match severity {
        AlertSeverity::Critical => name.red().bold().to_string(),
        AlertSeverity::High => name.red().to_string(),
        AlertSeverity::Medium => name.yellow().to_string(),
        AlertSeverity::Low => name.normal().to_string(),
    }
}

/// Truncates `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestPayload {
        field1: String,
        field2: u32,
    }

    impl Render for TestPayload {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "Field1: {}", self.field1)?;
            writeln!(w, "Field2: {}", self.field2)?;
            Ok(())
        }
    }

    fn payload() -> TestPayload {
        TestPayload {
            field1: "test value".to_owned(),
            field2: 42,
        }
    }

    #[test]
    fn test_render_text_format() {
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Text)
            .render_to(&mut buffer, &payload())
            .expect("text rendering should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Field1: test value"));
        assert!(output.contains("Field2: 42"));
    }

    #[test]
    fn test_render_json_format() {
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Json)
            .render_to(&mut buffer, &payload())
            .expect("json rendering should succeed");
        let parsed: serde_json::Value =
            serde_json::from_slice(&buffer).expect("output should be JSON");
        assert_eq!(parsed["field1"].as_str(), Some("test value"));
        assert_eq!(parsed["field2"].as_u64(), Some(42));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer message", 10), "a much ...");
        assert_eq!(truncate("日本語のログメッセージ", 5), "日本...");
    }

    #[test]
    fn test_labels_keep_level_name() {
        colored::control::set_override(false);
        assert_eq!(level_label(LogLevel::Error).trim(), "ERROR");
        assert_eq!(severity_label(AlertSeverity::Critical).trim(), "CRITICAL");
    }
}
