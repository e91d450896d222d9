//! Incident lifecycle.
//!
//! Incidents open in OPEN. Operators may move an incident between OPEN,
//! IN_PROGRESS and RESOLVED in any direction. CLOSED exists in the schema
//! but no exposed action reaches it; only a permissive policy writes it.
//! Entering RESOLVED sets `resolved_at`; no other transition touches it.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use watchpost_core::config::TransitionPolicy;
use watchpost_core::error::LifecycleError;
use watchpost_core::metrics as m;
use watchpost_core::store::Datastore;
use watchpost_core::types::{AlertSeverity, Incident, IncidentStatus};

use crate::config::TriageConfig;
use crate::error::TriageError;

/// States reachable through operator actions.
const EXPOSED: [IncidentStatus; 3] = [
    IncidentStatus::Open,
    IncidentStatus::InProgress,
    IncidentStatus::Resolved,
];

/// True when `from -> to` is an exposed operator transition.
pub fn is_exposed_transition(from: IncidentStatus, to: IncidentStatus) -> bool {
    from != to && EXPOSED.contains(&from) && EXPOSED.contains(&to)
}

/// Fields of an incident to be opened.
#[derive(Debug, Clone, Default)]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    /// Defaults to MEDIUM
    pub severity: Option<AlertSeverity>,
    pub alert_ids: Vec<Uuid>,
}

/// Applies operator actions to stored incidents.
pub struct IncidentLifecycle<S> {
    store: Arc<S>,
    policy: TransitionPolicy,
}

impl<S: Datastore> IncidentLifecycle<S> {
    pub fn new(store: Arc<S>, config: &TriageConfig) -> Self {
        Self {
            store,
            policy: config.transition_policy,
        }
    }

    /// Opens an incident on behalf of `operator`.
    ///
    /// # Errors
    /// - `NotAuthenticated` without an operator identity
    /// - `Validation` when the title is blank
    pub async fn create(
        &self,
        operator: Option<&str>,
        new: NewIncident,
    ) -> Result<Incident, TriageError> {
        let operator = operator
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .ok_or(TriageError::NotAuthenticated)?;
        if new.title.trim().is_empty() {
            return Err(TriageError::Validation(
                "incident title is required".to_owned(),
            ));
        }

        let now = Utc::now();
        let incident = Incident {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            severity: new.severity.unwrap_or(AlertSeverity::Medium),
            status: IncidentStatus::Open,
            created_by: operator.to_owned(),
            assigned_to: None,
            resolved_at: None,
            notes: String::new(),
            alert_ids: new.alert_ids,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_incident(incident.clone()).await?;
        tracing::info!(
            incident_id = %incident.id,
            created_by = operator,
            severity = %incident.severity,
            "incident opened"
        );
        Ok(incident)
    }

    pub async fn get(&self, id: Uuid) -> Result<Incident, TriageError> {
        Ok(self.store.get_incident(id).await?)
    }

    /// All incidents, newest first.
    pub async fn list(&self) -> Result<Vec<Incident>, TriageError> {
        Ok(self.store.list_incidents().await?)
    }

    /// Moves the incident to `status`, subject to the transition policy.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
    ) -> Result<Incident, TriageError> {
        let mut incident = self.store.get_incident(id).await?;
        let from = incident.status;
        if from == status {
            return Ok(incident);
        }
        if !is_exposed_transition(from, status) {
            match self.policy {
                TransitionPolicy::Strict => {
                    return Err(LifecycleError::IncidentTransition { from, to: status }.into());
                }
                TransitionPolicy::Permissive => tracing::warn!(
                    incident_id = %id,
                    from = %from,
                    to = %status,
                    "off-table incident transition allowed by permissive policy"
                ),
            }
        }

        let now = Utc::now();
        incident.status = status;
        incident.updated_at = now;
        if status == IncidentStatus::Resolved {
            incident.resolved_at = Some(now);
        }
        self.store.update_incident(incident.clone()).await?;

        metrics::counter!(
            m::LIFECYCLE_INCIDENT_TRANSITIONS_TOTAL,
            m::LABEL_STATUS => status.as_str()
        )
        .increment(1);
        tracing::info!(incident_id = %id, from = %from, to = %status, "incident transition");
        Ok(incident)
    }

    /// Sets or clears the assignee.
    pub async fn assign(&self, id: Uuid, operator: Option<String>) -> Result<Incident, TriageError> {
        self.modify(id, |incident| incident.assigned_to = operator)
            .await
    }

    /// Appends a note line, stamped with the time and author.
    pub async fn add_note(
        &self,
        id: Uuid,
        author: Option<&str>,
        text: &str,
    ) -> Result<Incident, TriageError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TriageError::Validation("note must not be empty".to_owned()));
        }
        let line = format!(
            "[{}] {}: {}",
            Utc::now().format("%Y-%m-%d %H:%M"),
            author.unwrap_or("anonymous"),
            text
        );
        self.modify(id, |incident| {
            if !incident.notes.is_empty() {
                incident.notes.push('\n');
            }
            incident.notes.push_str(&line);
        })
        .await
    }

    /// Links alerts to the incident. Already linked ids are ignored.
    pub async fn link_alerts(&self, id: Uuid, alert_ids: &[Uuid]) -> Result<Incident, TriageError> {
        self.modify(id, |incident| {
            for alert_id in alert_ids {
                if !incident.alert_ids.contains(alert_id) {
                    incident.alert_ids.push(*alert_id);
                }
            }
        })
        .await
    }

    async fn modify(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut Incident),
    ) -> Result<Incident, TriageError> {
        let mut incident = self.store.get_incident(id).await?;
        change(&mut incident);
        incident.updated_at = Utc::now();
        self.store.update_incident(incident.clone()).await?;
        Ok(incident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn lifecycle(
        store: &Arc<MemoryStore>,
        policy: TransitionPolicy,
    ) -> IncidentLifecycle<MemoryStore> {
        let config = TriageConfig::builder()
            .transition_policy(policy)
            .build()
            .unwrap();
        IncidentLifecycle::new(Arc::clone(store), &config)
    }

    fn new_incident() -> NewIncident {
        NewIncident {
            title: "Credential stuffing wave".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn exposed_transitions() {
        use IncidentStatus::*;
        for from in EXPOSED {
            for to in EXPOSED {
                assert_eq!(is_exposed_transition(from, to), from != to);
            }
            assert!(!is_exposed_transition(from, Closed));
            assert!(!is_exposed_transition(Closed, from));
        }
    }

    #[tokio::test]
    async fn create_requires_operator() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(&store, TransitionPolicy::Strict);
        assert!(matches!(
            lc.create(None, new_incident()).await,
            Err(TriageError::NotAuthenticated)
        ));
        assert!(matches!(
            lc.create(Some("  "), new_incident()).await,
            Err(TriageError::NotAuthenticated)
        ));
        assert!(store.list_incidents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_defaults() {
        let store = Arc::new(MemoryStore::new());
        let incident = lifecycle(&store, TransitionPolicy::Strict)
            .create(Some("analyst-7"), new_incident())
            .await
            .unwrap();
        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(incident.severity, AlertSeverity::Medium);
        assert_eq!(incident.created_by, "analyst-7");
        assert!(incident.resolved_at.is_none());
    }

    #[tokio::test]
    async fn create_requires_title() {
        let store = Arc::new(MemoryStore::new());
        let err = lifecycle(&store, TransitionPolicy::Strict)
            .create(Some("analyst-7"), NewIncident::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::Validation(_)));
    }

    #[tokio::test]
    async fn resolved_at_is_only_set_on_resolve() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(&store, TransitionPolicy::Strict);
        let incident = lc.create(Some("op"), new_incident()).await.unwrap();

        let in_progress = lc
            .set_status(incident.id, IncidentStatus::InProgress)
            .await
            .unwrap();
        assert!(in_progress.resolved_at.is_none());

        let resolved = lc
            .set_status(incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();
        let stamp = resolved.resolved_at.expect("resolved_at set");

        let reopened = lc
            .set_status(incident.id, IncidentStatus::Open)
            .await
            .unwrap();
        assert_eq!(reopened.status, IncidentStatus::Open);
        assert_eq!(reopened.resolved_at, Some(stamp));
    }

    #[tokio::test]
    async fn closed_is_unreachable_under_strict_policy() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(&store, TransitionPolicy::Strict);
        let incident = lc.create(Some("op"), new_incident()).await.unwrap();

        let err = lc
            .set_status(incident.id, IncidentStatus::Closed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TriageError::Lifecycle(LifecycleError::IncidentTransition { .. })
        ));
    }

    #[tokio::test]
    async fn permissive_policy_can_close() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(&store, TransitionPolicy::Permissive);
        let incident = lc.create(Some("op"), new_incident()).await.unwrap();
        let closed = lc
            .set_status(incident.id, IncidentStatus::Closed)
            .await
            .unwrap();
        assert_eq!(closed.status, IncidentStatus::Closed);
        assert!(closed.resolved_at.is_none());
    }

    #[tokio::test]
    async fn notes_append_with_author() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(&store, TransitionPolicy::Strict);
        let incident = lc.create(Some("op"), new_incident()).await.unwrap();

        lc.add_note(incident.id, Some("op"), "blocked 10.0.0.5 at the edge")
            .await
            .unwrap();
        let updated = lc
            .add_note(incident.id, None, "rotated credentials")
            .await
            .unwrap();
        let lines: Vec<&str> = updated.notes.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("op: blocked 10.0.0.5 at the edge"));
        assert!(lines[1].ends_with("anonymous: rotated credentials"));

        assert!(lc.add_note(incident.id, None, "   ").await.is_err());
    }

    #[tokio::test]
    async fn link_alerts_deduplicates() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(&store, TransitionPolicy::Strict);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let incident = lc
            .create(
                Some("op"),
                NewIncident {
                    alert_ids: vec![a],
                    ..new_incident()
                },
            )
            .await
            .unwrap();

        let linked = lc.link_alerts(incident.id, &[a, b]).await.unwrap();
        assert_eq!(linked.alert_ids, vec![a, b]);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle(&store, TransitionPolicy::Strict);
        lc.create(Some("op"), new_incident()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = lc.create(Some("op"), new_incident()).await.unwrap();
        let listed = lc.list().await.unwrap();
        assert_eq!(listed[0].id, newer.id);
    }
}
