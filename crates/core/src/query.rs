//! Typed log query evaluated by the datastore.
//!
//! A [`LogQuery`] is a conjunction of [`Predicate`]s, always ordered by
//! timestamp descending and capped by a row limit. The same query can be
//! evaluated in memory with [`LogQuery::matches`] or rendered as a
//! PostgREST-style filter string for a hosted backend.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::types::{LogEntry, LogLevel};

/// One constraint on a log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    /// Exact severity match
    LevelEq(LogLevel),
    /// Exact source name match
    SourceEq(String),
    /// Case-insensitive substring of the message or the source name
    TextContains(String),
    /// Substring of the textual IP address. Entries without an IP never match.
    IpContains(String),
    /// `timestamp >= bound`
    TimestampGte(DateTime<Utc>),
    /// `timestamp <= bound`
    TimestampLte(DateTime<Utc>),
}

impl Predicate {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            Predicate::LevelEq(level) => entry.level == *level,
            Predicate::SourceEq(source) => entry.source_name == *source,
            Predicate::TextContains(needle) => {
                let needle = needle.to_lowercase();
                entry.message.to_lowercase().contains(&needle)
                    || entry.source_name.to_lowercase().contains(&needle)
            }
            Predicate::IpContains(needle) => entry
                .ip_address
                .is_some_and(|ip| ip.to_string().contains(needle.as_str())),
            Predicate::TimestampGte(bound) => entry.timestamp >= *bound,
            Predicate::TimestampLte(bound) => entry.timestamp <= *bound,
        }
    }

    /// Renders the predicate as one `key=op.value` filter term.
    ///
    /// Values are percent-encoded so they never add terms of their own.
    /// Substring needles have their LIKE wildcards escaped, and inside the
    /// `or=(...)` group they are double-quoted, so the rendered filter
    /// selects the same rows as [`Predicate::matches`].
    pub fn to_filter_term(&self) -> String {
        match self {
            Predicate::LevelEq(level) => format!("level=eq.{level}"),
            Predicate::SourceEq(source) => format!("source_name=eq.{}", encode(source)),
            Predicate::TextContains(needle) => {
                let quoted = quote(&format!("*{}*", escape_like(needle)));
                let group = format!("(message.ilike.{quoted},source_name.ilike.{quoted})");
                format!("or={}", encode(&group))
            }
            Predicate::IpContains(needle) => {
                format!("ip_address=ilike.{}", encode(&format!("*{}*", escape_like(needle))))
            }
            Predicate::TimestampGte(bound) => format!("timestamp=gte.{}", encode(&rfc3339(bound))),
            Predicate::TimestampLte(bound) => format!("timestamp=lte.{}", encode(&rfc3339(bound))),
        }
    }
}

/// Characters that would be read as query-string structure.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Backslash-escapes LIKE metacharacters, `*` included.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_' | '*') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Double-quotes a value inside a logic group.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Conjunctive log query with a fixed `timestamp DESC` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogQuery {
    pub predicates: Vec<Predicate>,
    /// Maximum number of rows returned
    pub limit: usize,
}

impl LogQuery {
    /// An unconstrained query returning the `limit` most recent entries.
    pub fn new(limit: usize) -> Self {
        Self {
            predicates: Vec::new(),
            limit,
        }
    }

    /// Adds a predicate, AND-ed with the existing ones.
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty()
    }

    /// True when the entry satisfies every predicate.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.predicates.iter().all(|p| p.matches(entry))
    }

    /// Filters, orders and truncates `entries` the way a backend would.
    pub fn evaluate<'a, I>(&self, entries: I) -> Vec<LogEntry>
    where
        I: IntoIterator<Item = &'a LogEntry>,
    {
        let mut hits: Vec<LogEntry> = entries
            .into_iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(self.limit);
        hits
    }

    /// PostgREST-style query string, e.g.
    /// `level=eq.ERROR&order=timestamp.desc&limit=100`.
    pub fn to_query_string(&self) -> String {
        let mut terms: Vec<String> = self.predicates.iter().map(Predicate::to_filter_term).collect();
        terms.push("order=timestamp.desc".to_owned());
        terms.push(format!("limit={}", self.limit));
        terms.join("&")
    }
}

impl fmt::Display for LogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}
