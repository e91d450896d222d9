//! Aggregation engine.
//!
//! - level and source distributions over every stored entry
//! - day-bucketed time series over `[now - window, now]` for log levels and
//!   alert severities
//!
//! Buckets are calendar days in the configured [`BucketZone`], ascending.
//! Inside a populated day every key is present (zero-filled); days without
//! items are omitted.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::Serialize;

use watchpost_core::config::BucketZone;
use watchpost_core::store::Datastore;
use watchpost_core::types::{AlertSeverity, LogEntry, LogLevel, ThreatAlert};

use crate::config::TriageConfig;
use crate::error::TriageError;

/// A closed key set that time series are zero-filled with.
pub trait Bucketed: Copy + Ord + fmt::Display + 'static {
    fn all() -> &'static [Self];
}

impl Bucketed for LogLevel {
    fn all() -> &'static [Self] {
        LogLevel::ALL
    }
}

impl Bucketed for AlertSeverity {
    fn all() -> &'static [Self] {
        AlertSeverity::ALL
    }
}

/// An item placed on a time series.
pub trait Timestamped {
    type Key: Bucketed;

    fn bucket_key(&self) -> Self::Key;

    fn at(&self) -> DateTime<Utc>;
}

impl Timestamped for LogEntry {
    type Key = LogLevel;

    fn bucket_key(&self) -> LogLevel {
        self.level
    }

    fn at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for ThreatAlert {
    type Key = AlertSeverity;

    fn bucket_key(&self) -> AlertSeverity {
        self.severity
    }

    fn at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Counts for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket<K: Ord> {
    pub day: NaiveDate,
    pub counts: BTreeMap<K, u64>,
}

impl<K: Ord> DayBucket<K> {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// One slice of a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Share {
    pub name: String,
    pub count: u64,
    /// `round(count / total * 100)`
    pub percent: u8,
}

/// Per-level counts. Levels with no entries are absent.
pub fn level_distribution(entries: &[LogEntry]) -> BTreeMap<LogLevel, u64> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.level).or_insert(0) += 1;
    }
    counts
}

/// Per-source counts, uncapped.
pub fn source_distribution(entries: &[LogEntry]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.source_name.clone()).or_insert(0) += 1;
    }
    counts
}

/// Converts counts to shares of their total.
pub fn shares<K: fmt::Display>(counts: &BTreeMap<K, u64>) -> Vec<Share> {
    let total: u64 = counts.values().sum();
    counts
        .iter()
        .map(|(name, &count)| Share {
            name: name.to_string(),
            count,
            percent: percent(count, total),
        })
        .collect()
}

fn percent(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u8
}

fn day_in(zone: BucketZone, ts: DateTime<Utc>) -> NaiveDate {
    match zone {
        BucketZone::Local => ts.with_timezone(&Local).date_naive(),
        BucketZone::Fixed(offset) => ts.with_timezone(&offset).date_naive(),
    }
}

/// Buckets `items` by calendar day over `[now - window_days, now]`.
pub fn day_series<T: Timestamped>(
    items: &[T],
    now: DateTime<Utc>,
    window_days: u32,
    zone: BucketZone,
) -> Vec<DayBucket<T::Key>> {
    let since = now - Duration::days(i64::from(window_days));
    let mut days: BTreeMap<NaiveDate, BTreeMap<T::Key, u64>> = BTreeMap::new();

    for item in items {
        let at = item.at();
        if at < since || at > now {
            continue;
        }
        let counts = days.entry(day_in(zone, at)).or_insert_with(|| {
            T::Key::all().iter().map(|k| (*k, 0)).collect()
        });
        *counts.entry(item.bucket_key()).or_insert(0) += 1;
    }

    days.into_iter()
        .map(|(day, counts)| DayBucket { day, counts })
        .collect()
}

/// Everything the analytics view shows.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Entries scanned for the distributions
    pub total_logs: u64,
    pub level_distribution: Vec<Share>,
    pub source_distribution: Vec<Share>,
    pub log_timeline: Vec<DayBucket<LogLevel>>,
    pub threat_timeline: Vec<DayBucket<AlertSeverity>>,
}

/// Computes [`AnalyticsSnapshot`]s from a [`Datastore`].
pub struct AnalyticsEngine<S> {
    store: Arc<S>,
    window_days: u32,
    zone: BucketZone,
}

impl<S: Datastore> AnalyticsEngine<S> {
    pub fn new(store: Arc<S>, config: &TriageConfig) -> Self {
        Self {
            store,
            window_days: config.window_days,
            zone: config.bucket_zone,
        }
    }

    pub async fn snapshot(&self) -> Result<AnalyticsSnapshot, TriageError> {
        self.snapshot_at(Utc::now()).await
    }

    /// Computes the snapshot as seen at `now`.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Result<AnalyticsSnapshot, TriageError> {
        let since = now - Duration::days(i64::from(self.window_days));

        let all_logs = self.store.scan_logs(None).await?;
        let recent_alerts = self.store.scan_alerts(Some(since)).await?;

        let levels = level_distribution(&all_logs);
        let sources = source_distribution(&all_logs);

        Ok(AnalyticsSnapshot {
            generated_at: now,
            total_logs: all_logs.len() as u64,
            level_distribution: shares(&levels),
            source_distribution: shares(&sources),
            log_timeline: day_series(&all_logs, now, self.window_days, self.zone),
            threat_timeline: day_series(&recent_alerts, now, self.window_days, self.zone),
        })
    }
}
