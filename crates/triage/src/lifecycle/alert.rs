//! Alert lifecycle.
//!
//! ```text
//! NEW --investigate--> INVESTIGATING --resolve--> RESOLVED
//!                            |
//!                            +--mark false positive--> FALSE_POSITIVE
//! ```
//!
//! Entering RESOLVED sets `resolved_at`; entering any other state clears it.
//! Re-applying the current status writes nothing.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use watchpost_core::config::TransitionPolicy;
use watchpost_core::error::LifecycleError;
use watchpost_core::metrics as m;
use watchpost_core::store::Datastore;
use watchpost_core::types::{AlertSeverity, AlertStatus, ThreatAlert};

use crate::config::TriageConfig;
use crate::error::TriageError;

/// Operator actions on an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Investigate,
    Resolve,
    MarkFalsePositive,
}

impl AlertAction {
    pub const ALL: [AlertAction; 3] = [
        AlertAction::Investigate,
        AlertAction::Resolve,
        AlertAction::MarkFalsePositive,
    ];

    /// Status the action moves the alert into.
    pub fn target(self) -> AlertStatus {
        match self {
            AlertAction::Investigate => AlertStatus::Investigating,
            AlertAction::Resolve => AlertStatus::Resolved,
            AlertAction::MarkFalsePositive => AlertStatus::FalsePositive,
        }
    }
}

impl fmt::Display for AlertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertAction::Investigate => "investigate",
            AlertAction::Resolve => "resolve",
            AlertAction::MarkFalsePositive => "mark false positive",
        };
        f.write_str(name)
    }
}

/// True when `from -> to` is in the alert transition table.
pub fn is_standard_transition(from: AlertStatus, to: AlertStatus) -> bool {
    matches!(
        (from, to),
        (AlertStatus::New, AlertStatus::Investigating)
            | (AlertStatus::Investigating, AlertStatus::Resolved)
            | (AlertStatus::Investigating, AlertStatus::FalsePositive)
    )
}

/// Fields of an alert to be created.
#[derive(Debug, Clone, Default)]
pub struct NewAlert {
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub source: String,
    pub log_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub affected_systems: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewAlert {
    /// Builds the alert row: status NEW, no resolution time.
    pub fn into_alert(self) -> ThreatAlert {
        let now = Utc::now();
        ThreatAlert {
            id: Uuid::new_v4(),
            severity: self.severity,
            title: self.title,
            description: self.description,
            source: self.source,
            log_id: self.log_id,
            rule_id: self.rule_id,
            status: AlertStatus::New,
            affected_systems: self.affected_systems,
            assigned_to: None,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }
}

/// Applies operator actions to stored alerts.
pub struct AlertLifecycle<S> {
    store: Arc<S>,
    policy: TransitionPolicy,
    list_limit: usize,
}

impl<S: Datastore> AlertLifecycle<S> {
    pub fn new(store: Arc<S>, config: &TriageConfig) -> Self {
        Self {
            store,
            policy: config.transition_policy,
            list_limit: config.alert_list_limit,
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Stores a new alert in status NEW.
    pub async fn create(&self, new: NewAlert) -> Result<ThreatAlert, TriageError> {
        if new.title.trim().is_empty() {
            return Err(TriageError::Validation("alert title is required".to_owned()));
        }
        let alert = new.into_alert();
        self.store.insert_alert(alert.clone()).await?;
        tracing::info!(alert_id = %alert.id, severity = %alert.severity, "alert created");
        Ok(alert)
    }

    pub async fn get(&self, id: Uuid) -> Result<ThreatAlert, TriageError> {
        Ok(self.store.get_alert(id).await?)
    }

    /// Most recent alerts, newest first.
    pub async fn list(&self) -> Result<Vec<ThreatAlert>, TriageError> {
        Ok(self.store.list_alerts(self.list_limit).await?)
    }

    /// Applies a standard action. Always checked against the table.
    pub async fn apply(&self, id: Uuid, action: AlertAction) -> Result<ThreatAlert, TriageError> {
        let alert = self.store.get_alert(id).await?;
        let target = action.target();
        if alert.status == target {
            return Ok(alert);
        }
        if !is_standard_transition(alert.status, target) {
            return Err(LifecycleError::AlertTransition {
                from: alert.status,
                to: target,
            }
            .into());
        }
        self.write_status(alert, target).await
    }

    /// Writes a status directly, subject to the transition policy.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: AlertStatus,
    ) -> Result<ThreatAlert, TriageError> {
        let alert = self.store.get_alert(id).await?;
        if alert.status == status {
            return Ok(alert);
        }
        if !is_standard_transition(alert.status, status) {
            match self.policy {
                TransitionPolicy::Strict => {
                    return Err(LifecycleError::AlertTransition {
                        from: alert.status,
                        to: status,
                    }
                    .into());
                }
                TransitionPolicy::Permissive => {
                    tracing::warn!(
                        alert_id = %id,
                        from = %alert.status,
                        to = %status,
                        "off-table alert transition allowed by permissive policy"
                    );
                }
            }
        }
        self.write_status(alert, status).await
    }

    /// Sets or clears the assignee.
    pub async fn assign(
        &self,
        id: Uuid,
        operator: Option<String>,
    ) -> Result<ThreatAlert, TriageError> {
        let mut alert = self.store.get_alert(id).await?;
        alert.assigned_to = operator;
        alert.updated_at = Utc::now();
        self.store.update_alert(alert.clone()).await?;
        tracing::info!(alert_id = %id, assigned_to = ?alert.assigned_to, "alert assigned");
        Ok(alert)
    }

    async fn write_status(
        &self,
        current: ThreatAlert,
        target: AlertStatus,
    ) -> Result<ThreatAlert, TriageError> {
        let from = current.status;
        let now = Utc::now();
        let mut next = current;
        next.status = target;
        next.updated_at = now;
        next.resolved_at = (target == AlertStatus::Resolved).then_some(now);

        self.store.update_alert(next.clone()).await?;

        metrics::counter!(m::LIFECYCLE_ALERT_TRANSITIONS_TOTAL, m::LABEL_STATUS => target.as_str())
            .increment(1);
        tracing::info!(alert_id = %next.id, from = %from, to = %target, "alert transition");
        Ok(next)
    }
}
