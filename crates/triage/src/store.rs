//! In-memory datastore.
//!
//! [`MemoryStore`] implements [`Datastore`] over a `tokio::sync::RwLock`.
//! Queries are evaluated inside the store, the way a hosted backend would.
//! State can be saved to and loaded from a JSON snapshot so that the CLI
//! keeps data between runs.
//!
//! Every successful mutation publishes one change event per affected row.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use watchpost_core::error::StorageError;
use watchpost_core::event::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use watchpost_core::query::LogQuery;
use watchpost_core::store::Datastore;
use watchpost_core::types::{
    AlertStatus, Incident, LogEntry, LogSource, SourceStatus, ThreatAlert, ThreatRule,
};

use crate::error::TriageError;

const COMPONENT: &str = "memory-store";

/// Write-failure injection disabled.
const NO_INJECTION: usize = usize::MAX;

/// Serializable content of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub alerts: Vec<ThreatAlert>,
    #[serde(default)]
    pub incidents: Vec<Incident>,
    #[serde(default)]
    pub sources: Vec<LogSource>,
    #[serde(default)]
    pub rules: Vec<ThreatRule>,
}

/// Reference [`Datastore`] kept in memory.
pub struct MemoryStore {
    data: RwLock<Snapshot>,
    feed: ChangeFeed,
    /// Writes allowed before injected failures start; `NO_INJECTION` disables.
    writes_before_failure: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_feed(ChangeFeed::default())
    }

    /// Creates an empty store publishing on `feed`.
    pub fn with_feed(feed: ChangeFeed) -> Self {
        Self::from_snapshot(Snapshot::default(), feed)
    }

    pub fn from_snapshot(snapshot: Snapshot, feed: ChangeFeed) -> Self {
        Self {
            data: RwLock::new(snapshot),
            feed,
            writes_before_failure: AtomicUsize::new(NO_INJECTION),
        }
    }

    /// Loads a snapshot file. A missing file yields an empty store.
    pub async fn open(path: impl AsRef<Path>, feed: ChangeFeed) -> Result<Self, TriageError> {
        let path = path.as_ref();
        let snapshot = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Query(format!("corrupt snapshot {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no snapshot, starting empty");
                Snapshot::default()
            }
            Err(e) => return Err(TriageError::Io(e)),
        };
        Ok(Self::from_snapshot(snapshot, feed))
    }

    /// Writes the current state to `path`, replacing it atomically.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), TriageError> {
        let path = path.as_ref();
        let bytes = {
            let data = self.data.read().await;
            serde_json::to_vec_pretty(&*data)
                .map_err(|e| StorageError::Query(format!("snapshot encoding failed: {e}")))?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Snapshot {
        self.data.read().await.clone()
    }

    /// Lets `writes` more writes succeed, then fails every write with a
    /// connection error until [`clear_write_failures`](Self::clear_write_failures).
    pub fn fail_writes_after(&self, writes: usize) {
        self.writes_before_failure.store(writes, Ordering::SeqCst);
    }

    pub fn clear_write_failures(&self) {
        self.writes_before_failure
            .store(NO_INJECTION, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StorageError> {
        let outcome = self.writes_before_failure.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |remaining| match remaining {
                NO_INJECTION => Some(NO_INJECTION),
                0 => None,
                n => Some(n - 1),
            },
        );
        match outcome {
            Ok(_) => Ok(()),
            Err(_) => Err(StorageError::Connection(
                "injected write failure".to_owned(),
            )),
        }
    }

    fn publish(&self, table: Table, kind: ChangeKind, row: Uuid) {
        self.feed
            .publish(ChangeEvent::new(COMPONENT, table, kind, row));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn since_filter(ts: DateTime<Utc>, since: Option<DateTime<Utc>>) -> bool {
    since.is_none_or(|bound| ts >= bound)
}

impl Datastore for MemoryStore {
    async fn insert_logs(&self, entries: Vec<LogEntry>) -> Result<usize, StorageError> {
        self.check_write()?;
        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        {
            let mut data = self.data.write().await;
            data.logs.extend(entries);
        }
        for id in &ids {
            self.publish(Table::Logs, ChangeKind::Insert, *id);
        }
        Ok(ids.len())
    }

    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        let data = self.data.read().await;
        Ok(query.evaluate(&data.logs))
    }

    async fn scan_logs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<LogEntry>, StorageError> {
        let data = self.data.read().await;
        let mut hits: Vec<LogEntry> = data
            .logs
            .iter()
            .filter(|e| since_filter(e.timestamp, since))
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.timestamp);
        Ok(hits)
    }

    async fn count_logs(&self) -> Result<u64, StorageError> {
        Ok(self.data.read().await.logs.len() as u64)
    }

    async fn distinct_sources(&self, limit: usize) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        let mut recent: Vec<&LogEntry> = data.logs.iter().collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let names: BTreeSet<&str> = recent
            .into_iter()
            .take(limit)
            .map(|e| e.source_name.as_str())
            .collect();
        Ok(names.into_iter().map(str::to_owned).collect())
    }

    async fn insert_alert(&self, alert: ThreatAlert) -> Result<(), StorageError> {
        self.check_write()?;
        let id = alert.id;
        self.data.write().await.alerts.push(alert);
        self.publish(Table::ThreatAlerts, ChangeKind::Insert, id);
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> Result<ThreatAlert, StorageError> {
        let data = self.data.read().await;
        data.alerts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity: "alert",
                id: id.to_string(),
            })
    }

    async fn list_alerts(&self, limit: usize) -> Result<Vec<ThreatAlert>, StorageError> {
        let data = self.data.read().await;
        let mut alerts = data.alerts.clone();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn update_alert(&self, alert: ThreatAlert) -> Result<(), StorageError> {
        self.check_write()?;
        let id = alert.id;
        {
            let mut data = self.data.write().await;
            let slot = data
                .alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| StorageError::NotFound {
                    entity: "alert",
                    id: id.to_string(),
                })?;
            *slot = alert;
        }
        self.publish(Table::ThreatAlerts, ChangeKind::Update, id);
        Ok(())
    }

    async fn scan_alerts(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ThreatAlert>, StorageError> {
        let data = self.data.read().await;
        let mut hits: Vec<ThreatAlert> = data
            .alerts
            .iter()
            .filter(|a| since_filter(a.created_at, since))
            .cloned()
            .collect();
        hits.sort_by_key(|a| a.created_at);
        Ok(hits)
    }

    async fn count_alerts(&self, status: AlertStatus) -> Result<u64, StorageError> {
        let data = self.data.read().await;
        Ok(data.alerts.iter().filter(|a| a.status == status).count() as u64)
    }

    async fn insert_incident(&self, incident: Incident) -> Result<(), StorageError> {
        self.check_write()?;
        let id = incident.id;
        self.data.write().await.incidents.push(incident);
        self.publish(Table::Incidents, ChangeKind::Insert, id);
        Ok(())
    }

    async fn get_incident(&self, id: Uuid) -> Result<Incident, StorageError> {
        let data = self.data.read().await;
        data.incidents
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity: "incident",
                id: id.to_string(),
            })
    }

    async fn list_incidents(&self) -> Result<Vec<Incident>, StorageError> {
        let data = self.data.read().await;
        let mut incidents = data.incidents.clone();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }

    async fn update_incident(&self, incident: Incident) -> Result<(), StorageError> {
        self.check_write()?;
        let id = incident.id;
        {
            let mut data = self.data.write().await;
            let slot = data
                .incidents
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| StorageError::NotFound {
                    entity: "incident",
                    id: id.to_string(),
                })?;
            *slot = incident;
        }
        self.publish(Table::Incidents, ChangeKind::Update, id);
        Ok(())
    }

    async fn insert_source(&self, source: LogSource) -> Result<(), StorageError> {
        self.check_write()?;
        let id = source.id;
        self.data.write().await.sources.push(source);
        self.publish(Table::LogSources, ChangeKind::Insert, id);
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<LogSource>, StorageError> {
        let data = self.data.read().await;
        let mut sources = data.sources.clone();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn count_active_sources(&self) -> Result<u64, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .sources
            .iter()
            .filter(|s| s.status == SourceStatus::Active)
            .count() as u64)
    }

    async fn upsert_rule(&self, rule: ThreatRule) -> Result<(), StorageError> {
        self.check_write()?;
        let id = rule.id;
        let kind = {
            let mut data = self.data.write().await;
            match data.rules.iter().position(|r| r.id == id) {
                Some(index) => {
                    data.rules[index] = rule;
                    ChangeKind::Update
                }
                None => {
                    data.rules.push(rule);
                    ChangeKind::Insert
                }
            }
        };
        self.publish(Table::ThreatRules, kind, id);
        Ok(())
    }

    async fn list_rules(&self) -> Result<Vec<ThreatRule>, StorageError> {
        let data = self.data.read().await;
        let mut rules = data.rules.clone();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rules)
    }

    fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;
    use watchpost_core::types::{AlertSeverity, AlertStatus, LogEntry, LogLevel, ThreatAlert};

    pub fn log_at(level: LogLevel, source: &str, message: &str, ts: DateTime<Utc>) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            timestamp: ts,
            ingested_at: ts,
            source_name: source.to_owned(),
            source_id: None,
            level,
            message: message.to_owned(),
            raw_data: None,
            parsed_data: None,
            ip_address: None,
            hash: None,
        }
    }

    pub fn alert_at(severity: AlertSeverity, ts: DateTime<Utc>) -> ThreatAlert {
        ThreatAlert {
            id: Uuid::new_v4(),
            severity,
            title: "Suspicious login".to_owned(),
            description: String::new(),
            source: "auth.log".to_owned(),
            log_id: None,
            rule_id: None,
            status: AlertStatus::New,
            affected_systems: Vec::new(),
            assigned_to: None,
            metadata: None,
            created_at: ts,
            updated_at: ts,
            resolved_at: None,
        }
    }

    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::Duration;
    use watchpost_core::types::{AlertSeverity, LogLevel, SourceType};

    #[tokio::test]
    async fn insert_logs_publishes_one_event_per_row() {
        let store = MemoryStore::new();
        let mut rx = store.change_feed().subscribe();
        let n = store
            .insert_logs(vec![
                log_at(LogLevel::Info, "a", "one", now()),
                log_at(LogLevel::Error, "a", "two", now()),
            ])
            .await
            .unwrap();
        assert_eq!(n, 2);
        for _ in 0..2 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.table, Table::Logs);
            assert_eq!(event.kind, ChangeKind::Insert);
        }
        assert_eq!(store.count_logs().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn injected_failure_leaves_state_untouched() {
        let store = MemoryStore::new();
        store.fail_writes_after(1);
        store
            .insert_logs(vec![log_at(LogLevel::Info, "a", "ok", now())])
            .await
            .unwrap();
        let err = store
            .insert_logs(vec![log_at(LogLevel::Info, "a", "lost", now())])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
        assert_eq!(store.count_logs().await.unwrap(), 1);

        store.clear_write_failures();
        store
            .insert_logs(vec![log_at(LogLevel::Info, "a", "again", now())])
            .await
            .unwrap();
        assert_eq!(store.count_logs().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn distinct_sources_scans_only_recent_entries() {
        let store = MemoryStore::new();
        let base = now();
        store
            .insert_logs(vec![
                log_at(LogLevel::Info, "old", "m", base - Duration::hours(3)),
                log_at(LogLevel::Info, "beta", "m", base - Duration::hours(1)),
                log_at(LogLevel::Info, "alpha", "m", base),
                log_at(LogLevel::Info, "alpha", "m", base - Duration::minutes(5)),
            ])
            .await
            .unwrap();
        let sources = store.distinct_sources(3).await.unwrap();
        assert_eq!(sources, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn scan_logs_is_ascending_and_bounded() {
        let store = MemoryStore::new();
        let base = now();
        store
            .insert_logs(vec![
                log_at(LogLevel::Info, "a", "late", base),
                log_at(LogLevel::Info, "a", "ancient", base - Duration::days(30)),
                log_at(LogLevel::Info, "a", "early", base - Duration::hours(2)),
            ])
            .await
            .unwrap();
        let scanned = store
            .scan_logs(Some(base - Duration::days(7)))
            .await
            .unwrap();
        let messages: Vec<&str> = scanned.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn update_missing_alert_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_alert(alert_at(AlertSeverity::Low, now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: "alert", .. }));
    }

    #[tokio::test]
    async fn list_alerts_newest_first_with_limit() {
        let store = MemoryStore::new();
        let base = now();
        for i in 0..5 {
            store
                .insert_alert(alert_at(AlertSeverity::High, base - Duration::minutes(i)))
                .await
                .unwrap();
        }
        let alerts = store.list_alerts(3).await.unwrap();
        assert_eq!(alerts.len(), 3);
        assert!(alerts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(alerts[0].created_at, base);
    }

    #[tokio::test]
    async fn upsert_rule_reports_insert_then_update() {
        let store = MemoryStore::new();
        let mut rx = store.change_feed().subscribe();
        let mut rule = ThreatRule {
            id: Uuid::new_v4(),
            name: "ssh brute force".to_owned(),
            description: String::new(),
            pattern: "Failed password".to_owned(),
            severity: AlertSeverity::High,
            enabled: true,
            created_at: now(),
        };
        store.upsert_rule(rule.clone()).await.unwrap();
        rule.enabled = false;
        store.upsert_rule(rule).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Insert);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Update);
        let rules = store.list_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert!(!rules[0].enabled);
    }

    #[tokio::test]
    async fn count_active_sources_ignores_inactive() {
        let store = MemoryStore::new();
        for (name, status) in [
            ("fw", SourceStatus::Active),
            ("ids", SourceStatus::Inactive),
            ("web", SourceStatus::Active),
        ] {
            store
                .insert_source(LogSource {
                    id: Uuid::new_v4(),
                    name: name.to_owned(),
                    source_type: SourceType::Syslog,
                    description: None,
                    connection_config: None,
                    status,
                    last_sync: None,
                    created_at: now(),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.count_active_sources().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("state.json");

        let store = MemoryStore::new();
        store
            .insert_logs(vec![log_at(LogLevel::Error, "db", "disk full", now())])
            .await
            .unwrap();
        store
            .insert_alert(alert_at(AlertSeverity::Critical, now()))
            .await
            .unwrap();
        store.save(&path).await.unwrap();

        let reopened = MemoryStore::open(&path, ChangeFeed::default())
            .await
            .unwrap();
        assert_eq!(reopened.count_logs().await.unwrap(), 1);
        assert_eq!(reopened.count_alerts(AlertStatus::New).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn open_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("absent.json"), ChangeFeed::default())
            .await
            .unwrap();
        assert_eq!(store.count_logs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        let result = MemoryStore::open(&path, ChangeFeed::default()).await;
        assert!(matches!(result, Err(TriageError::Storage(_))));
    }
}
