//! Report requests.
//!
//! Generation only validates the request and issues a [`ReportTicket`];
//! nothing is rendered.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TriageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Compliance,
    Security,
    Incident,
    Executive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Excel,
    Csv,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Compliance => "compliance",
            ReportKind::Security => "security",
            ReportKind::Incident => "incident",
            ReportKind::Executive => "executive",
        }
    }
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "excel",
            ReportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compliance" => Ok(ReportKind::Compliance),
            "security" => Ok(ReportKind::Security),
            "incident" => Ok(ReportKind::Incident),
            "executive" => Ok(ReportKind::Executive),
            other => Err(TriageError::Validation(format!(
                "unknown report kind '{other}' (expected compliance, security, incident or executive)"
            ))),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "excel" => Ok(ReportFormat::Excel),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(TriageError::Validation(format!(
                "unknown report format '{other}' (expected pdf, excel or csv)"
            ))),
        }
    }
}

/// Report parameters as entered by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub format: ReportFormat,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Accepted report request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTicket {
    pub id: Uuid,
    pub kind: ReportKind,
    pub format: ReportFormat,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

impl ReportRequest {
    /// Validates the range and issues a ticket.
    ///
    /// # Errors
    /// `Validation` when either bound is missing or `start > end`.
    pub fn generate(&self) -> Result<ReportTicket, TriageError> {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Err(TriageError::Validation(
                "report range needs both a start and an end".to_owned(),
            ));
        };
        if start > end {
            return Err(TriageError::Validation(format!(
                "report range starts after it ends ({start} > {end})"
            )));
        }

        let ticket = ReportTicket {
            id: Uuid::new_v4(),
            kind: self.kind,
            format: self.format,
            start,
            end,
            generated_at: Utc::now(),
        };
        tracing::info!(
            report_id = %ticket.id,
            kind = %ticket.kind,
            format = %ticket.format,
            "report requested"
        );
        Ok(ticket)
    }
}
