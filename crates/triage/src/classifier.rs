//! Keyword severity classifier.
//!
//! [`KeywordClassifier`] assigns a level by first-match priority over
//! case-insensitive keyword checks:
//!
//! ```text
//! "critical" -> CRITICAL
//! "error"    -> ERROR
//! "warning"  -> WARNING
//! warn       -> WARNING   (whole word only: "WARN:", "[warn]")
//! "debug"    -> DEBUG
//! otherwise  -> INFO
//! ```
//!
//! The most severe keyword wins regardless of where it appears in the line.

use chrono::Utc;
use uuid::Uuid;

use watchpost_core::pipeline::LineClassifier;
use watchpost_core::types::{LogEntry, LogLevel};

#[derive(Debug, Clone, Copy)]
enum Keyword {
    /// Matches anywhere in the line
    Substring(&'static str),
    /// Matches only between non-alphanumeric boundaries
    Word(&'static str),
}

impl Keyword {
    /// `lowered` must already be lowercase.
    fn found_in(self, lowered: &str) -> bool {
        match self {
            Keyword::Substring(needle) => lowered.contains(needle),
            Keyword::Word(word) => lowered.match_indices(word).any(|(start, _)| {
                let before = lowered[..start].chars().next_back();
                let after = lowered[start + word.len()..].chars().next();
                !before.is_some_and(char::is_alphanumeric)
                    && !after.is_some_and(char::is_alphanumeric)
            }),
        }
    }
}

/// Priority-ordered keyword table.
const KEYWORDS: &[(Keyword, LogLevel)] = &[
    (Keyword::Substring("critical"), LogLevel::Critical),
    (Keyword::Substring("error"), LogLevel::Error),
    (Keyword::Substring("warning"), LogLevel::Warning),
    (Keyword::Word("warn"), LogLevel::Warning),
    (Keyword::Substring("debug"), LogLevel::Debug),
];

/// Classifies free-form lines by severity keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Level implied by `line`.
    pub fn level_of(line: &str) -> LogLevel {
        let lowered = line.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(keyword, _)| keyword.found_in(&lowered))
            .map_or(LogLevel::Info, |(_, level)| *level)
    }
}

impl LineClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    fn classify(&self, line: &str, source_name: &str) -> LogEntry {
        let now = Utc::now();
        LogEntry {
            id: Uuid::new_v4(),
            timestamp: now,
            ingested_at: now,
            source_name: source_name.to_owned(),
            source_id: None,
            level: Self::level_of(line),
            message: line.to_owned(),
            raw_data: Some(line.to_owned()),
            parsed_data: None,
            ip_address: None,
            hash: None,
        }
    }
}
