//! Filter engine behind the log browser.
//!
//! A [`FilterSpec`] holds the raw criteria from the search form. It is
//! compiled into one [`LogQuery`] that the datastore evaluates in a single
//! request. Fields are AND-ed; missing, empty and `"all"` values impose no
//! constraint.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use watchpost_core::metrics as m;
use watchpost_core::query::{LogQuery, Predicate};
use watchpost_core::store::Datastore;
use watchpost_core::types::{LogEntry, LogLevel};

use crate::config::TriageConfig;
use crate::error::TriageError;

/// Search criteria as entered by an operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Substring of the message or the source name, case-insensitive
    #[serde(default)]
    pub query: Option<String>,
    /// Level name, or `"all"`
    #[serde(default)]
    pub level: Option<String>,
    /// Exact source name, or `"all"`
    #[serde(default)]
    pub source: Option<String>,
    /// Substring of the IP address
    #[serde(default)]
    pub ip: Option<String>,
    /// Inclusive lower time bound
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper time bound
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Returns the value unless it is blank or the `"all"` sentinel.
fn selected(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl FilterSpec {
    /// Compiles the criteria into a query capped at `limit` rows.
    ///
    /// # Errors
    /// `Validation` when the level is not one of the five known levels.
    pub fn compile(&self, limit: usize) -> Result<LogQuery, TriageError> {
        let mut query = LogQuery::new(limit);

        if let Some(text) = self.query.as_deref().filter(|q| !q.trim().is_empty()) {
            query = query.and(Predicate::TextContains(text.to_owned()));
        }

        if let Some(level) = selected(self.level.as_deref()) {
            let level: LogLevel = level
                .parse()
                .map_err(|e: watchpost_core::types::ParseEnumError| {
                    TriageError::Validation(e.to_string())
                })?;
            query = query.and(Predicate::LevelEq(level));
        }

        if let Some(source) = selected(self.source.as_deref()) {
            query = query.and(Predicate::SourceEq(source.to_owned()));
        }

        if let Some(ip) = self.ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty()) {
            query = query.and(Predicate::IpContains(ip.to_owned()));
        }

        if let Some(start) = self.start {
            query = query.and(Predicate::TimestampGte(start));
        }
        if let Some(end) = self.end {
            query = query.and(Predicate::TimestampLte(end));
        }

        Ok(query)
    }
}

/// Runs log searches against a [`Datastore`].
pub struct FilterEngine<S> {
    store: Arc<S>,
    page_size: usize,
    source_list_limit: usize,
}

impl<S: Datastore> FilterEngine<S> {
    pub fn new(store: Arc<S>, config: &TriageConfig) -> Self {
        Self {
            store,
            page_size: config.page_size,
            source_list_limit: config.source_list_limit,
        }
    }

    /// Row cap applied to every search.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Most recent matching entries, timestamp descending.
    pub async fn search(&self, spec: &FilterSpec) -> Result<Vec<LogEntry>, TriageError> {
        let query = spec.compile(self.page_size)?;
        metrics::counter!(m::FILTER_QUERIES_TOTAL).increment(1);
        tracing::debug!(query = %query, "log search");
        Ok(self.store.query_logs(&query).await?)
    }

    /// Source names for the source selector.
    pub async fn distinct_sources(&self) -> Result<Vec<String>, TriageError> {
        Ok(self.store.distinct_sources(self.source_list_limit).await?)
    }
}
