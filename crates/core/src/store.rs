//! Datastore seam.
//!
//! Persistence is owned by an external service. Components depend on the
//! [`Datastore`] trait only, and every successful mutation publishes one
//! [`ChangeEvent`](crate::event::ChangeEvent) on the store's
//! [`ChangeFeed`].

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;
use crate::event::ChangeFeed;
use crate::query::LogQuery;
use crate::types::{AlertStatus, Incident, LogEntry, LogSource, ThreatAlert, ThreatRule};

/// Storage operations used by the triage components.
///
/// Implementations must not block the runtime; all methods are async and the
/// returned futures are `Send` so they can run in spawned tasks.
pub trait Datastore: Send + Sync + 'static {
    // --- logs ---

    /// Inserts a batch atomically: either every entry is stored or none is.
    /// Returns the number of stored entries.
    fn insert_logs(
        &self,
        entries: Vec<LogEntry>,
    ) -> impl Future<Output = Result<usize, StorageError>> + Send;

    /// Evaluates a query server-side (`timestamp DESC`, `limit`).
    fn query_logs(
        &self,
        query: &LogQuery,
    ) -> impl Future<Output = Result<Vec<LogEntry>, StorageError>> + Send;

    /// Every entry with `timestamp >= since`, ascending by timestamp.
    fn scan_logs(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<LogEntry>, StorageError>> + Send;

    fn count_logs(&self) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Distinct source names across the `limit` most recent entries,
    /// sorted alphabetically.
    fn distinct_sources(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    // --- alerts ---

    fn insert_alert(
        &self,
        alert: ThreatAlert,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get_alert(&self, id: Uuid)
    -> impl Future<Output = Result<ThreatAlert, StorageError>> + Send;

    /// Most recent alerts by creation time, newest first.
    fn list_alerts(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ThreatAlert>, StorageError>> + Send;

    /// Replaces the stored alert with the same id.
    fn update_alert(
        &self,
        alert: ThreatAlert,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Alerts created at or after `since`, ascending by creation time.
    fn scan_alerts(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<ThreatAlert>, StorageError>> + Send;

    fn count_alerts(
        &self,
        status: AlertStatus,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    // --- incidents ---

    fn insert_incident(
        &self,
        incident: Incident,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get_incident(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Incident, StorageError>> + Send;

    /// All incidents, newest first.
    fn list_incidents(&self) -> impl Future<Output = Result<Vec<Incident>, StorageError>> + Send;

    fn update_incident(
        &self,
        incident: Incident,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    // --- sources ---

    fn insert_source(
        &self,
        source: LogSource,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list_sources(&self) -> impl Future<Output = Result<Vec<LogSource>, StorageError>> + Send;

    fn count_active_sources(&self) -> impl Future<Output = Result<u64, StorageError>> + Send;

    // --- rules ---

    /// Inserts the rule or replaces the one with the same id.
    fn upsert_rule(&self, rule: ThreatRule)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list_rules(&self) -> impl Future<Output = Result<Vec<ThreatRule>, StorageError>> + Send;

    /// Change feed that receives one event per successful mutation.
    fn change_feed(&self) -> &ChangeFeed;
}
