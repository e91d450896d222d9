#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod types;

// --- re-exports ---

// errors
pub use error::{ConfigError, LifecycleError, StorageError, WatchpostError};

// config
pub use config::{BucketZone, TransitionPolicy, WatchpostConfig};

// events
pub use event::{ChangeEvent, ChangeFeed, ChangeKind, Event, EventMetadata, Table};

// extension points
pub use pipeline::LineClassifier;
pub use query::{LogQuery, Predicate};
pub use store::Datastore;

// domain types
pub use types::{
    AlertSeverity, AlertStatus, Incident, IncidentStatus, LogEntry, LogLevel, LogSource,
    ParseEnumError, SourceStatus, SourceType, ThreatAlert, ThreatRule,
};
