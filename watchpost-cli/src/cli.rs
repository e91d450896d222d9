//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use watchpost_core::types::{AlertSeverity, AlertStatus, IncidentStatus, LogLevel, SourceType};
use watchpost_triage::{ReportFormat, ReportKind};

/// Watchpost -- security log triage.
///
/// Use `watchpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "watchpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the watchpost.toml configuration file.
    #[arg(short, long, default_value = "watchpost.toml", global = true)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Operator identity for audited actions (overrides general.operator).
    #[arg(long, global = true)]
    pub operator: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import log files.
    Import(ImportArgs),

    /// Search stored log entries.
    Search(SearchArgs),

    /// Show level/source distributions and daily timelines.
    Analytics,

    /// Show summary counters.
    Stats,

    /// Work threat alerts.
    Alerts(AlertsArgs),

    /// Work incidents.
    Incidents(IncidentsArgs),

    /// Manage log sources.
    Sources(SourcesArgs),

    /// Manage threat detection rules.
    Rules(RulesArgs),

    /// Ask the inference endpoint about recent activity.
    Analyze(AnalyzeArgs),

    /// Request a report.
    Report(ReportArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- import ----

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Files to import (.txt, .log, .json, .csv by default).
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Run the stored detection rules over the imported entries.
    #[arg(long)]
    pub detect: bool,
}

// ---- search ----

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Substring of the message or source name (case-insensitive).
    #[arg(short, long)]
    pub query: Option<String>,

    /// Exact level (DEBUG, INFO, WARNING, ERROR, CRITICAL).
    #[arg(short, long)]
    pub level: Option<LogLevel>,

    /// Exact source name.
    #[arg(short, long)]
    pub source: Option<String>,

    /// Substring of the IP address.
    #[arg(long)]
    pub ip: Option<String>,

    /// Inclusive lower bound (RFC 3339).
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Inclusive upper bound (RFC 3339).
    #[arg(long)]
    pub until: Option<DateTime<Utc>>,

    /// List the known source names instead of searching.
    #[arg(long, conflicts_with_all = ["query", "level", "source", "ip", "since", "until"])]
    pub list_sources: bool,
}

// ---- alerts ----

#[derive(Args, Debug)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub action: AlertsAction,
}

#[derive(Subcommand, Debug)]
pub enum AlertsAction {
    /// List the most recent alerts.
    List,
    /// Raise an alert manually.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "MEDIUM")]
        severity: AlertSeverity,
        #[arg(long, default_value = "manual")]
        source: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Affected system (repeatable).
        #[arg(long = "system")]
        systems: Vec<String>,
    },
    /// NEW -> INVESTIGATING.
    Investigate { id: Uuid },
    /// INVESTIGATING -> RESOLVED.
    Resolve { id: Uuid },
    /// INVESTIGATING -> FALSE_POSITIVE.
    FalsePositive { id: Uuid },
    /// Write a status directly (subject to lifecycle.transition_policy).
    SetStatus { id: Uuid, status: AlertStatus },
    /// Set or clear the assignee.
    Assign {
        id: Uuid,
        /// Assignee; omit to clear.
        #[arg(long)]
        to: Option<String>,
    },
}

// ---- incidents ----

#[derive(Args, Debug)]
pub struct IncidentsArgs {
    #[command(subcommand)]
    pub action: IncidentsAction,
}

#[derive(Subcommand, Debug)]
pub enum IncidentsAction {
    /// List incidents, newest first.
    List,
    /// Open an incident (requires an operator identity).
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        severity: Option<AlertSeverity>,
        #[arg(long, default_value = "")]
        description: String,
        /// Related alert id (repeatable).
        #[arg(long = "alert")]
        alerts: Vec<Uuid>,
    },
    /// Move an incident to OPEN, IN_PROGRESS or RESOLVED.
    SetStatus { id: Uuid, status: IncidentStatus },
    /// Set or clear the assignee.
    Assign {
        id: Uuid,
        #[arg(long)]
        to: Option<String>,
    },
    /// Append a note.
    Note { id: Uuid, text: String },
    /// Link alerts to an incident.
    Link {
        id: Uuid,
        #[arg(required = true)]
        alerts: Vec<Uuid>,
    },
}

// ---- sources ----

#[derive(Args, Debug)]
pub struct SourcesArgs {
    #[command(subcommand)]
    pub action: SourcesAction,
}

#[derive(Subcommand, Debug)]
pub enum SourcesAction {
    /// List registered log sources.
    List,
    /// Register a log source.
    Add {
        #[arg(long)]
        name: String,
        /// FILE, SYSLOG, API, FTP, USB or REALTIME.
        #[arg(long = "type")]
        source_type: SourceType,
        #[arg(long)]
        description: Option<String>,
        /// Register the source as inactive.
        #[arg(long)]
        inactive: bool,
    },
}

// ---- rules ----

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List stored detection rules.
    List,
    /// Load YAML rule files from a directory and store them.
    Load {
        /// Directory containing .yml/.yaml rule files.
        path: PathBuf,
    },
}

// ---- analyze ----

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Free-text question.
    #[arg(required_unless_present = "preset")]
    pub query: Option<String>,

    /// Use a preset quick query instead.
    #[arg(long, conflicts_with = "query")]
    pub preset: Option<PresetArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    Anomalies,
    ThreatSummary,
    SecurityPosture,
    Recommendations,
}

// ---- report ----

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// compliance, security, incident or executive.
    #[arg(long)]
    pub kind: ReportKind,

    /// pdf, excel or csv.
    #[arg(long)]
    pub format: ReportFormat,

    /// Range start (RFC 3339).
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Range end (RFC 3339).
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, ingest, query, analytics,
        /// lifecycle, notifier, analysis).
        #[arg(long)]
        section: Option<String>,
    },
}
