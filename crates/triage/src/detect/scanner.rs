//! Rule scanner.
//!
//! [`RuleScanner`] compiles each rule's pattern once at registration and
//! matches it against log messages.

use std::collections::HashMap;

use regex::Regex;
use uuid::Uuid;

use watchpost_core::types::{LogEntry, ThreatAlert, ThreatRule};

use crate::error::TriageError;
use crate::lifecycle::NewAlert;

/// Matches registered rules against log entries.
#[derive(Default)]
pub struct RuleScanner {
    rules: Vec<ThreatRule>,
    /// Compiled patterns keyed by rule id
    regex_cache: HashMap<Uuid, Regex>,
}

impl RuleScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a scanner from `rules`, failing on the first invalid pattern.
    pub fn with_rules(rules: impl IntoIterator<Item = ThreatRule>) -> Result<Self, TriageError> {
        let mut scanner = Self::new();
        for rule in rules {
            scanner.register(rule)?;
        }
        Ok(scanner)
    }

    /// Adds a rule, replacing any registered rule with the same id.
    ///
    /// # Errors
    /// `RuleValidation` when the pattern does not compile.
    pub fn register(&mut self, rule: ThreatRule) -> Result<(), TriageError> {
        let regex = Regex::new(&rule.pattern).map_err(|e| TriageError::RuleValidation {
            rule: rule.name.clone(),
            reason: format!("invalid pattern: {e}"),
        })?;
        self.remove(rule.id);
        self.regex_cache.insert(rule.id, regex);
        self.rules.push(rule);
        Ok(())
    }

    pub fn remove(&mut self, rule_id: Uuid) {
        self.rules.retain(|r| r.id != rule_id);
        self.regex_cache.remove(&rule_id);
    }

    pub fn rules(&self) -> &[ThreatRule] {
        &self.rules
    }

    pub fn enabled_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }

    /// Alerts for every (enabled rule, entry) pair whose message matches.
    pub fn scan(&self, entries: &[LogEntry]) -> Vec<ThreatAlert> {
        let mut alerts = Vec::new();
        for entry in entries {
            for rule in self.rules.iter().filter(|r| r.enabled) {
                let Some(regex) = self.regex_cache.get(&rule.id) else {
                    continue;
                };
                if regex.is_match(&entry.message) {
                    alerts.push(alert_for(rule, entry));
                }
            }
        }
        alerts
    }
}

fn alert_for(rule: &ThreatRule, entry: &LogEntry) -> ThreatAlert {
    NewAlert {
        severity: rule.severity,
        title: rule.name.clone(),
        description: if rule.description.is_empty() {
            entry.message.clone()
        } else {
            rule.description.clone()
        },
        source: entry.source_name.clone(),
        log_id: Some(entry.id),
        rule_id: Some(rule.id),
        affected_systems: entry.ip_address.iter().map(ToString::to_string).collect(),
        metadata: Some(serde_json::json!({
            "pattern": rule.pattern,
            "message": entry.message,
        })),
    }
    .into_alert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{log_at, now};
    use chrono::Utc;
    use watchpost_core::types::{AlertSeverity, AlertStatus, LogLevel};

    fn rule(name: &str, pattern: &str, severity: AlertSeverity) -> ThreatRule {
        ThreatRule {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            description: String::new(),
            pattern: pattern.to_owned(),
            severity,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let mut scanner = RuleScanner::new();
        let err = scanner
            .register(rule("broken", "(unclosed", AlertSeverity::Low))
            .unwrap_err();
        assert!(matches!(err, TriageError::RuleValidation { .. }));
        assert!(scanner.rules().is_empty());
    }

    #[test]
    fn match_builds_new_alert() {
        let r = rule("SSH brute force", "(?i)failed password", AlertSeverity::High);
        let scanner = RuleScanner::with_rules([r.clone()]).unwrap();

        let mut entry = log_at(
            LogLevel::Warning,
            "auth.log",
            "Failed password for root from 10.0.0.9",
            now(),
        );
        entry.ip_address = Some("10.0.0.9".parse().unwrap());
        let quiet = log_at(LogLevel::Info, "auth.log", "session opened", now());

        let alerts = scanner.scan(&[entry.clone(), quiet]);
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.status, AlertStatus::New);
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.title, "SSH brute force");
        assert_eq!(alert.source, "auth.log");
        assert_eq!(alert.log_id, Some(entry.id));
        assert_eq!(alert.rule_id, Some(r.id));
        assert_eq!(alert.affected_systems, vec!["10.0.0.9".to_owned()]);
        assert!(alert.resolved_at.is_none());
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut r = rule("any", ".", AlertSeverity::Low);
        r.enabled = false;
        let scanner = RuleScanner::with_rules([r]).unwrap();
        assert_eq!(scanner.enabled_count(), 0);
        assert!(scanner
            .scan(&[log_at(LogLevel::Info, "a", "anything", now())])
            .is_empty());
    }

    #[test]
    fn register_replaces_same_id() {
        let mut r = rule("x", "foo", AlertSeverity::Low);
        let mut scanner = RuleScanner::with_rules([r.clone()]).unwrap();
        r.pattern = "bar".to_owned();
        scanner.register(r).unwrap();
        assert_eq!(scanner.rules().len(), 1);

        let entries = [
            log_at(LogLevel::Info, "a", "foo", now()),
            log_at(LogLevel::Info, "a", "bar", now()),
        ];
        let alerts = scanner.scan(&entries);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].log_id, Some(entries[1].id));
    }

    #[test]
    fn every_matching_rule_fires() {
        let scanner = RuleScanner::with_rules([
            rule("disk", "disk", AlertSeverity::Medium),
            rule("full", "full", AlertSeverity::Low),
        ])
        .unwrap();
        let alerts = scanner.scan(&[log_at(LogLevel::Error, "a", "disk full", now())]);
        assert_eq!(alerts.len(), 2);
    }
}
