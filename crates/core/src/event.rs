//! Change events emitted by the datastore.
//!
//! Every successful mutation publishes one [`ChangeEvent`] on the store's
//! [`ChangeFeed`]. Events carry the table, the kind of mutation and the row
//! id. Row contents are not diffed; subscribers re-query what they need.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default capacity of the change feed's broadcast channel.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Tracing metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// When the event was created
    pub timestamp: DateTime<Utc>,
    /// Component that produced the event (e.g. `"memory-store"`)
    pub source_component: String,
    /// Correlates events belonging to one operation
    pub trace_id: String,
}

impl EventMetadata {
    /// Creates metadata that continues an existing trace.
    pub fn new(source_component: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source_component: source_component.into(),
            trace_id: trace_id.into(),
        }
    }

    /// Creates metadata that starts a new trace.
    pub fn with_new_trace(source_component: impl Into<String>) -> Self {
        Self::new(source_component, Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.source_component,
            self.trace_id,
        )
    }
}

/// Common interface of events passed between components.
pub trait Event: Send + Sync + 'static {
    fn event_id(&self) -> &str;

    fn metadata(&self) -> &EventMetadata;

    /// Short type name used in logs
    fn event_type(&self) -> &str;
}

/// Persisted table that a change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Logs,
    ThreatAlerts,
    Incidents,
    LogSources,
    ThreatRules,
}

impl Table {
    pub const ALL: &'static [Table] = &[
        Table::Logs,
        Table::ThreatAlerts,
        Table::Incidents,
        Table::LogSources,
        Table::ThreatRules,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Logs => "logs",
            Table::ThreatAlerts => "threat_alerts",
            Table::Incidents => "incidents",
            Table::LogSources => "log_sources",
            Table::ThreatRules => "threat_rules",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The subscriber fell behind and some events were dropped.
    /// Receivers treat it like any other change and refresh.
    Lagged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
            ChangeKind::Lagged => "lagged",
        };
        f.write_str(name)
    }
}

/// One storage-level change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub metadata: EventMetadata,
    pub table: Table,
    pub kind: ChangeKind,
    /// Affected row. `None` for lag markers.
    pub row_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn new(
        source_component: impl Into<String>,
        table: Table,
        kind: ChangeKind,
        row_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(source_component),
            table,
            kind,
            row_id: Some(row_id),
        }
    }

    /// Builds the marker delivered to a subscriber that missed `skipped` events.
    pub fn lagged(table: Table, skipped: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(format!("notifier (skipped {skipped})")),
            table,
            kind: ChangeKind::Lagged,
            row_id: None,
        }
    }
}

impl Event for ChangeEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        "change"
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row_id {
            Some(row) => write!(f, "{} {} {}", self.kind, self.table, row),
            None => write!(f, "{} {}", self.kind, self.table),
        }
    }
}

/// Broadcast fan-out of [`ChangeEvent`]s.
///
/// Cloning a feed shares the underlying channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Having no receivers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::trace!(event = %event, "change published");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Number of live broadcast receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_metadata_new_preserves_trace_id() {
        let meta = EventMetadata::new("memory-store", "trace-123");
        assert_eq!(meta.source_component, "memory-store");
        assert_eq!(meta.trace_id, "trace-123");
    }

    #[test]
    fn event_metadata_with_new_trace_generates_uuid() {
        let meta = EventMetadata::with_new_trace("memory-store");
        assert!(Uuid::parse_str(&meta.trace_id).is_ok());
    }

    #[test]
    fn table_wire_names() {
        assert_eq!(Table::ThreatAlerts.to_string(), "threat_alerts");
        assert_eq!(
            serde_json::to_string(&Table::LogSources).unwrap(),
            "\"log_sources\""
        );
    }

    #[test]
    fn change_event_display() {
        let row = Uuid::new_v4();
        let event = ChangeEvent::new("memory-store", Table::Logs, ChangeKind::Insert, row);
        assert_eq!(event.to_string(), format!("insert logs {row}"));
        assert_eq!(event.event_type(), "change");
    }

    #[test]
    fn lagged_event_has_no_row() {
        let event = ChangeEvent::lagged(Table::ThreatAlerts, 3);
        assert_eq!(event.kind, ChangeKind::Lagged);
        assert!(event.row_id.is_none());
        assert!(event.metadata.source_component.contains('3'));
    }

    #[tokio::test]
    async fn feed_delivers_to_every_subscriber() {
        let feed = ChangeFeed::new(8);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        assert_eq!(feed.receiver_count(), 2);

        feed.publish(ChangeEvent::new(
            "test",
            Table::Incidents,
            ChangeKind::Update,
            Uuid::new_v4(),
        ));

        assert_eq!(a.recv().await.unwrap().table, Table::Incidents);
        assert_eq!(b.recv().await.unwrap().kind, ChangeKind::Update);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::default();
        feed.publish(ChangeEvent::new(
            "test",
            Table::Logs,
            ChangeKind::Insert,
            Uuid::new_v4(),
        ));
        assert_eq!(feed.receiver_count(), 0);
    }
}
