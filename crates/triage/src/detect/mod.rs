//! Pattern based threat detection.
//!
//! Rules come from YAML files ([`RuleLoader`]) or from the datastore. The
//! [`Detector`] registers them with a [`RuleScanner`] and stores one NEW
//! alert per match.

pub mod loader;
pub mod scanner;

use std::path::Path;
use std::sync::Arc;

use watchpost_core::metrics as m;
use watchpost_core::store::Datastore;
use watchpost_core::types::{LogEntry, ThreatAlert, ThreatRule};

use crate::error::TriageError;

pub use loader::RuleLoader;
pub use scanner::RuleScanner;

/// Runs detection rules and records the resulting alerts.
pub struct Detector<S> {
    store: Arc<S>,
    scanner: RuleScanner,
}

impl<S: Datastore> Detector<S> {
    /// Creates a detector with the rules already in the store.
    ///
    /// Stored rules whose pattern no longer compiles are skipped.
    pub async fn from_store(store: Arc<S>) -> Result<Self, TriageError> {
        let mut scanner = RuleScanner::new();
        for rule in store.list_rules().await? {
            let name = rule.name.clone();
            if let Err(e) = scanner.register(rule) {
                tracing::warn!(rule = %name, error = %e, "stored rule skipped");
            }
        }
        Ok(Self { store, scanner })
    }

    pub fn scanner(&self) -> &RuleScanner {
        &self.scanner
    }

    /// Validates, stores and registers one rule.
    pub async fn add_rule(&mut self, rule: ThreatRule) -> Result<(), TriageError> {
        loader::validate(&rule)?;
        self.store.upsert_rule(rule.clone()).await?;
        tracing::info!(rule_id = %rule.id, rule = %rule.name, "rule registered");
        self.scanner.register(rule)
    }

    /// Loads a rule directory and adds each rule. Returns how many were added.
    pub async fn load_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize, TriageError> {
        let rules = RuleLoader::load_directory(dir).await?;
        let count = rules.len();
        for rule in rules {
            self.add_rule(rule).await?;
        }
        Ok(count)
    }

    /// Scans `entries` and stores every resulting alert.
    ///
    /// Stops at the first failed insert; alerts stored before it remain.
    pub async fn detect(&self, entries: &[LogEntry]) -> Result<Vec<ThreatAlert>, TriageError> {
        let alerts = self.scanner.scan(entries);
        for alert in &alerts {
            self.store.insert_alert(alert.clone()).await?;
            metrics::counter!(m::DETECTION_ALERTS_TOTAL).increment(1);
        }
        if !alerts.is_empty() {
            tracing::info!(
                scanned = entries.len(),
                alerts = alerts.len(),
                "detection raised alerts"
            );
        }
        Ok(alerts)
    }
}
