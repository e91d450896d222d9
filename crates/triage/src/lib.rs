#![doc = include_str!("../README.md")]
//!
//! # Modules
//!
//! - [`classifier`]: keyword based level classification of raw lines
//! - [`ingest`]: upload pipeline (validation, classification, batch insert, progress)
//! - [`filter`]: search criteria compiled into one datastore query
//! - [`aggregate`]: level/source distributions and per-day timelines
//! - [`notifier`]: per-topic subscriptions over the change feed
//! - [`dashboard`]: cached view state refreshed by live subscriptions
//! - [`lifecycle`]: alert and incident state machines
//! - [`detect`]: YAML threat rules and the regex scanner
//! - [`analysis`]: requests to an external inference endpoint
//! - [`report`]: report request validation
//! - [`store`]: in-memory [`Datastore`](watchpost_core::Datastore) with JSON snapshots
//!
//! # Data flow
//!
//! ```text
//! files -> IngestPipeline -> Datastore -> ChangeFeed -> ChangeNotifier -> Dashboard views
//!                               |    ^
//!            FilterEngine / AnalyticsEngine    Lifecycles / Detector
//! ```

pub mod aggregate;
pub mod analysis;
pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod detect;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod lifecycle;
pub mod notifier;
pub mod report;
pub mod store;

// --- re-exports ---

pub use config::{TriageConfig, TriageConfigBuilder};
pub use error::TriageError;
pub use store::{MemoryStore, Snapshot};

// ingestion
pub use classifier::KeywordClassifier;
pub use ingest::{
    FileReport, IngestPipeline, IngestPipelineBuilder, IngestProgress, IngestReport, UploadFile,
};

// queries and views
pub use aggregate::{AnalyticsEngine, AnalyticsSnapshot, DayBucket, Share};
pub use dashboard::{Dashboard, DashboardState, LiveView, Notice, NoticeLevel, StatsOverview, ViewKind};
pub use filter::{FilterEngine, FilterSpec};
pub use notifier::{ChangeNotifier, Subscription, Topic};

// triage actions
pub use analysis::{
    AnalysisIssue, AnalysisRequest, AnalysisResult, Analyzer, HttpInferenceEndpoint,
    InferenceEndpoint, Preset,
};
pub use detect::{Detector, RuleLoader, RuleScanner};
pub use lifecycle::{AlertAction, AlertLifecycle, IncidentLifecycle, NewAlert, NewIncident};
pub use report::{ReportFormat, ReportKind, ReportRequest, ReportTicket};
