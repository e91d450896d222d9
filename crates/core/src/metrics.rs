//! Metric names and descriptions.
//!
//! Every metric is named here and emitted through the `metrics` facade
//! (`metrics::counter!`, `metrics::gauge!`). No exporter is installed by the
//! library; a host process can install any recorder.
//!
//! # Naming
//!
//! - prefix: `watchpost_`
//! - component: `ingest_`, `filter_`, `notifier_`, `dashboard_`, `lifecycle_`, `analysis_`
//! - suffix: `_total` for counters, none for gauges
//!
//! ```ignore
//! metrics::counter!(watchpost_core::metrics::INGEST_ENTRIES_TOTAL).increment(3);
//! ```

// ─── label keys ────────────────────────────────────────────────

/// Topic label key (logs, threat_alerts, all)
pub const LABEL_TOPIC: &str = "topic";

/// View label key (log_list, alert_list, analytics, stats)
pub const LABEL_VIEW: &str = "view";

/// Target status label key
pub const LABEL_STATUS: &str = "status";

/// Outcome label key (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── ingestion ─────────────────────────────────────────────────

/// Files committed by the ingestion pipeline (counter)
pub const INGEST_FILES_TOTAL: &str = "watchpost_ingest_files_total";

/// Log entries committed by the ingestion pipeline (counter)
pub const INGEST_ENTRIES_TOTAL: &str = "watchpost_ingest_entries_total";

/// Aborted uploads (counter)
pub const INGEST_FAILURES_TOTAL: &str = "watchpost_ingest_failures_total";

// ─── filter ────────────────────────────────────────────────────

/// Log searches executed (counter)
pub const FILTER_QUERIES_TOTAL: &str = "watchpost_filter_queries_total";

// ─── notifier / dashboard ──────────────────────────────────────

/// Live change subscriptions (gauge, label: topic)
pub const NOTIFIER_ACTIVE_SUBSCRIPTIONS: &str = "watchpost_notifier_active_subscriptions";

/// View refreshes (counter, labels: view, result)
pub const DASHBOARD_REFRESHES_TOTAL: &str = "watchpost_dashboard_refreshes_total";

// ─── lifecycle ─────────────────────────────────────────────────

/// Alert status transitions written (counter, label: status)
pub const LIFECYCLE_ALERT_TRANSITIONS_TOTAL: &str = "watchpost_lifecycle_alert_transitions_total";

/// Incident status transitions written (counter, label: status)
pub const LIFECYCLE_INCIDENT_TRANSITIONS_TOTAL: &str =
    "watchpost_lifecycle_incident_transitions_total";

// ─── detection / analysis ──────────────────────────────────────

/// Alerts raised by rule matches (counter)
pub const DETECTION_ALERTS_TOTAL: &str = "watchpost_detection_alerts_total";

/// Requests sent to the inference endpoint (counter, label: result)
pub const ANALYSIS_REQUESTS_TOTAL: &str = "watchpost_analysis_requests_total";

/// Registers descriptions for every metric.
///
/// Harmless without an installed recorder.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        INGEST_FILES_TOTAL,
        "Total number of uploaded files committed"
    );
    describe_counter!(
        INGEST_ENTRIES_TOTAL,
        "Total number of log entries classified and committed"
    );
    describe_counter!(
        INGEST_FAILURES_TOTAL,
        "Total number of uploads aborted by an insert failure"
    );
    describe_counter!(FILTER_QUERIES_TOTAL, "Total number of log searches");
    describe_gauge!(
        NOTIFIER_ACTIVE_SUBSCRIPTIONS,
        "Number of live change subscriptions per topic"
    );
    describe_counter!(
        DASHBOARD_REFRESHES_TOTAL,
        "Total number of view refreshes triggered by change events"
    );
    describe_counter!(
        LIFECYCLE_ALERT_TRANSITIONS_TOTAL,
        "Total number of alert status transitions written"
    );
    describe_counter!(
        LIFECYCLE_INCIDENT_TRANSITIONS_TOTAL,
        "Total number of incident status transitions written"
    );
    describe_counter!(
        DETECTION_ALERTS_TOTAL,
        "Total number of alerts raised by detection rules"
    );
    describe_counter!(
        ANALYSIS_REQUESTS_TOTAL,
        "Total number of requests sent to the inference endpoint"
    );
}
