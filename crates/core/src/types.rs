//! Domain types shared by every Watchpost crate.
//!
//! Status and severity values are closed enums. Unknown values are rejected
//! both by `serde` deserialization and by [`FromStr`](std::str::FromStr), so a
//! malformed row never falls through to a default.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a string is not one of an enum's closed set of values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct ParseEnumError {
    /// Enum name, e.g. `"log level"`
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
    /// Comma separated list of accepted values
    pub expected: String,
}

/// Generates the wire name table, `Display` and strict `FromStr` for a
/// closed enum. Parsing is case-insensitive on input but never coerces an
/// unknown value.
macro_rules! closed_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            /// Every value, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Wire name of the value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($wire) {
                        return Ok($ty::$variant);
                    }
                )+
                Err(ParseEnumError {
                    kind: $kind,
                    value: s.to_owned(),
                    expected: [$($wire),+].join(", "),
                })
            }
        }
    };
}

/// Log severity level.
///
/// Ordered from least to most urgent (`Debug < Info < ... < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

closed_enum!(LogLevel, "log level", {
    Debug => "DEBUG",
    Info => "INFO",
    Warning => "WARNING",
    Error => "ERROR",
    Critical => "CRITICAL",
});

/// Severity of alerts, incidents, rules and analysis issues.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

closed_enum!(AlertSeverity, "alert severity", {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

/// Investigation status of a threat alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    #[default]
    New,
    Investigating,
    Resolved,
    FalsePositive,
}

closed_enum!(AlertStatus, "alert status", {
    New => "NEW",
    Investigating => "INVESTIGATING",
    Resolved => "RESOLVED",
    FalsePositive => "FALSE_POSITIVE",
});

/// Status of a hand-opened incident.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

closed_enum!(IncidentStatus, "incident status", {
    Open => "OPEN",
    InProgress => "IN_PROGRESS",
    Resolved => "RESOLVED",
    Closed => "CLOSED",
});

/// Kind of log source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    File,
    Syslog,
    Api,
    Ftp,
    Usb,
    Realtime,
}

closed_enum!(SourceType, "source type", {
    File => "FILE",
    Syslog => "SYSLOG",
    Api => "API",
    Ftp => "FTP",
    Usb => "USB",
    Realtime => "REALTIME",
});

/// Whether a log source is currently feeding data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Active,
    Inactive,
}

closed_enum!(SourceStatus, "source status", {
    Active => "active",
    Inactive => "inactive",
});

/// One classified unit of log data.
///
/// Created by the ingestion pipeline and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    /// Event time
    pub timestamp: DateTime<Utc>,
    /// Time the entry was classified
    pub ingested_at: DateTime<Utc>,
    pub source_name: String,
    /// Optional reference to a [`LogSource`]
    #[serde(default)]
    pub source_id: Option<Uuid>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub raw_data: Option<String>,
    #[serde(default)]
    pub parsed_data: Option<serde_json::Value>,
    #[serde(default)]
    pub ip_address: Option<IpAddr>,
    /// Content hash, when the producer computed one
    #[serde(default)]
    pub hash: Option<String>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.level,
            self.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            self.source_name,
            self.message,
        )
    }
}

/// A configured producer of logs. Reference data, shared by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSource {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub connection_config: Option<serde_json::Value>,
    #[serde(default)]
    pub status: SourceStatus,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.source_type, self.status)
    }
}

/// A detected threat, tracked through the alert lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAlert {
    pub id: Uuid,
    pub severity: AlertSeverity,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Originating source label
    pub source: String,
    /// Log entry that caused the alert
    #[serde(default)]
    pub log_id: Option<Uuid>,
    /// Rule that triggered the alert
    #[serde(default)]
    pub rule_id: Option<Uuid>,
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(default)]
    pub affected_systems: Vec<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only while the status is `RESOLVED`
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl fmt::Display for ThreatAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}, source: {})",
            self.severity, self.title, self.status, self.source,
        )
    }
}

/// A case record opened by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: AlertSeverity,
    #[serde(default)]
    pub status: IncidentStatus,
    /// Operator who opened the incident
    pub created_by: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
    /// Related threat alerts
    #[serde(default)]
    pub alert_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}, opened by {})",
            self.severity, self.title, self.status, self.created_by,
        )
    }
}

/// Pattern based detection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Regular expression matched against log messages
    pub pattern: String,
    pub severity: AlertSeverity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl fmt::Display for ThreatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.enabled { "enabled" } else { "disabled" };
        write!(f, "{} [{}] /{}/ ({state})", self.name, self.severity, self.pattern)
    }
}
