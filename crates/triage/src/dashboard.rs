//! Dashboard state and live views.
//!
//! [`DashboardState`] caches the result of each view, tracks whether it is
//! stale and publishes a refresh generation per view on a `watch` channel.
//! [`Dashboard::attach`] activates a view: it loads the view once, then
//! spawns one task per topic the view depends on. Each task refreshes the
//! view whenever its subscription yields a change. Dropping or detaching the
//! returned [`LiveView`] cancels the tasks and releases their subscriptions.
//!
//! Refresh failures never propagate out of a task. They become error
//! notices in a bounded queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use watchpost_core::metrics as m;
use watchpost_core::store::Datastore;
use watchpost_core::types::{AlertStatus, LogEntry, ThreatAlert};

use crate::aggregate::{AnalyticsEngine, AnalyticsSnapshot};
use crate::config::TriageConfig;
use crate::error::TriageError;
use crate::filter::{FilterEngine, FilterSpec};
use crate::notifier::{ChangeNotifier, Subscription, Topic};

/// Dashboard panels with a cached result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    LogList,
    AlertList,
    Analytics,
    Stats,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::LogList,
        ViewKind::AlertList,
        ViewKind::Analytics,
        ViewKind::Stats,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::LogList => "log_list",
            ViewKind::AlertList => "alert_list",
            ViewKind::Analytics => "analytics",
            ViewKind::Stats => "stats",
        }
    }

    /// Topics whose changes invalidate this view.
    pub fn topics(self) -> &'static [Topic] {
        match self {
            ViewKind::LogList => &[Topic::Logs],
            ViewKind::AlertList => &[Topic::ThreatAlerts],
            ViewKind::Analytics => &[Topic::Logs, Topic::ThreatAlerts],
            ViewKind::Stats => &[Topic::All],
        }
    }

    fn index(self) -> usize {
        match self {
            ViewKind::LogList => 0,
            ViewKind::AlertList => 1,
            ViewKind::Analytics => 2,
            ViewKind::Stats => 3,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Short operator-facing message.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Summary counters of the stats panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsOverview {
    pub logs_processed: u64,
    /// Alerts in NEW
    pub active_threats: u64,
    /// Alerts in RESOLVED
    pub threats_resolved: u64,
    pub active_sources: u64,
}

impl StatsOverview {
    pub async fn collect<S: Datastore>(store: &S) -> Result<Self, TriageError> {
        Ok(Self {
            logs_processed: store.count_logs().await?,
            active_threats: store.count_alerts(AlertStatus::New).await?,
            threats_resolved: store.count_alerts(AlertStatus::Resolved).await?,
            active_sources: store.count_active_sources().await?,
        })
    }
}

/// Cached view results, staleness flags, refresh generations and notices.
pub struct DashboardState {
    filter: RwLock<FilterSpec>,
    logs: RwLock<Vec<LogEntry>>,
    alerts: RwLock<Vec<ThreatAlert>>,
    analytics: RwLock<Option<AnalyticsSnapshot>>,
    stats: RwLock<Option<StatsOverview>>,
    stale: [AtomicBool; 4],
    generations: [watch::Sender<u64>; 4],
    notices: Mutex<VecDeque<Notice>>,
    notice_capacity: usize,
}

impl DashboardState {
    pub fn new(notice_capacity: usize) -> Self {
        Self {
            filter: RwLock::new(FilterSpec::default()),
            logs: RwLock::default(),
            alerts: RwLock::default(),
            analytics: RwLock::default(),
            stats: RwLock::default(),
            stale: std::array::from_fn(|_| AtomicBool::new(true)),
            generations: std::array::from_fn(|_| watch::channel(0).0),
            notices: Mutex::new(VecDeque::with_capacity(notice_capacity)),
            notice_capacity: notice_capacity.max(1),
        }
    }

    pub async fn filter(&self) -> FilterSpec {
        self.filter.read().await.clone()
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.logs.read().await.clone()
    }

    pub async fn alerts(&self) -> Vec<ThreatAlert> {
        self.alerts.read().await.clone()
    }

    pub async fn analytics(&self) -> Option<AnalyticsSnapshot> {
        self.analytics.read().await.clone()
    }

    pub async fn stats(&self) -> Option<StatsOverview> {
        *self.stats.read().await
    }

    /// True until the view has been refreshed since its last invalidation.
    pub fn is_stale(&self, view: ViewKind) -> bool {
        self.stale[view.index()].load(Ordering::SeqCst)
    }

    /// Completed refreshes of `view`.
    pub fn generation(&self, view: ViewKind) -> u64 {
        *self.generations[view.index()].borrow()
    }

    /// Receiver that changes on every completed refresh of `view`.
    pub fn watch(&self, view: ViewKind) -> watch::Receiver<u64> {
        self.generations[view.index()].subscribe()
    }

    /// Queues a notice, dropping the oldest one when the queue is full.
    pub async fn push_notice(&self, level: NoticeLevel, message: impl Into<String>) {
        let mut notices = self.notices.lock().await;
        if notices.len() == self.notice_capacity {
            notices.pop_front();
        }
        notices.push_back(Notice {
            level,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// Queued notices, oldest first.
    pub async fn notices(&self) -> Vec<Notice> {
        self.notices.lock().await.iter().cloned().collect()
    }

    /// Removes and returns the queued notices.
    pub async fn take_notices(&self) -> Vec<Notice> {
        self.notices.lock().await.drain(..).collect()
    }

    fn invalidate(&self, view: ViewKind) {
        self.stale[view.index()].store(true, Ordering::SeqCst);
    }

    fn refreshed(&self, view: ViewKind) {
        self.stale[view.index()].store(false, Ordering::SeqCst);
        self.generations[view.index()].send_modify(|g| *g += 1);
    }
}

struct Inner<S> {
    store: Arc<S>,
    state: DashboardState,
    notifier: ChangeNotifier,
    filter: FilterEngine<S>,
    analytics: AnalyticsEngine<S>,
    alert_list_limit: usize,
}

impl<S: Datastore> Inner<S> {
    async fn refresh(&self, view: ViewKind) -> Result<(), TriageError> {
        match view {
            ViewKind::LogList => {
                let spec = self.state.filter().await;
                let rows = self.filter.search(&spec).await?;
                *self.state.logs.write().await = rows;
            }
            ViewKind::AlertList => {
                let rows = self.store.list_alerts(self.alert_list_limit).await?;
                *self.state.alerts.write().await = rows;
            }
            ViewKind::Analytics => {
                let snapshot = self.analytics.snapshot().await?;
                *self.state.analytics.write().await = Some(snapshot);
            }
            ViewKind::Stats => {
                let stats = StatsOverview::collect(self.store.as_ref()).await?;
                *self.state.stats.write().await = Some(stats);
            }
        }
        self.state.refreshed(view);
        Ok(())
    }

    async fn refresh_or_notify(&self, view: ViewKind) -> Result<(), TriageError> {
        let outcome = self.refresh(view).await;
        let result = if outcome.is_ok() { "success" } else { "failure" };
        metrics::counter!(
            m::DASHBOARD_REFRESHES_TOTAL,
            m::LABEL_VIEW => view.as_str(),
            m::LABEL_RESULT => result
        )
        .increment(1);

        match &outcome {
            Ok(()) => tracing::debug!(view = %view, "view refreshed"),
            Err(e) => {
                tracing::warn!(view = %view, error = %e, "view refresh failed");
                self.state
                    .push_notice(NoticeLevel::Error, format!("{view}: {e}"))
                    .await;
            }
        }
        outcome
    }
}

/// Owns the store, the cached state and the change notifier.
pub struct Dashboard<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Dashboard<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Datastore> Dashboard<S> {
    /// Creates a dashboard listening on the store's change feed.
    pub fn new(store: Arc<S>, config: &TriageConfig) -> Self {
        let notifier = ChangeNotifier::new(store.change_feed().clone());
        Self {
            inner: Arc::new(Inner {
                filter: FilterEngine::new(Arc::clone(&store), config),
                analytics: AnalyticsEngine::new(Arc::clone(&store), config),
                state: DashboardState::new(config.notice_capacity),
                alert_list_limit: config.alert_list_limit,
                notifier,
                store,
            }),
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.inner.state
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    /// Recomputes one view now. Failures are also queued as notices.
    pub async fn refresh(&self, view: ViewKind) -> Result<(), TriageError> {
        self.inner.refresh_or_notify(view).await
    }

    /// Replaces the log filter and reloads the log list.
    ///
    /// # Errors
    /// `Validation` when the criteria do not compile. The previous filter
    /// and the cached list are kept.
    pub async fn set_filter(&self, spec: FilterSpec) -> Result<(), TriageError> {
        spec.compile(self.inner.filter.page_size())?;
        *self.inner.state.filter.write().await = spec;
        self.inner.state.invalidate(ViewKind::LogList);
        self.refresh(ViewKind::LogList).await
    }

    /// Activates `view`: loads it once and keeps it current until the
    /// returned handle is detached or dropped.
    ///
    /// A failed initial load is queued as a notice; the view stays attached.
    pub async fn attach(&self, view: ViewKind) -> LiveView {
        let token = CancellationToken::new();
        let subscriptions: Vec<Subscription> = view
            .topics()
            .iter()
            .map(|topic| self.inner.notifier.subscribe(*topic))
            .collect();

        let _ = self.inner.refresh_or_notify(view).await;

        let handles = subscriptions
            .into_iter()
            .map(|sub| {
                tokio::spawn(watch_topic(
                    Arc::clone(&self.inner),
                    view,
                    sub,
                    token.child_token(),
                ))
            })
            .collect();

        tracing::debug!(view = %view, "view attached");
        LiveView {
            view,
            token,
            handles,
        }
    }
}

async fn watch_topic<S: Datastore>(
    inner: Arc<Inner<S>>,
    view: ViewKind,
    mut sub: Subscription,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            event = sub.recv() => {
                let Some(event) = event else { break };
                // one refresh covers everything already queued
                let coalesced = sub.drain_ready();
                tracing::debug!(
                    view = %view,
                    topic = %sub.topic(),
                    change = %event,
                    coalesced,
                    "change received"
                );
                inner.state.invalidate(view);
                let _ = inner.refresh_or_notify(view).await;
            }
        }
    }
}

/// Handle of an attached view.
pub struct LiveView {
    view: ViewKind,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl LiveView {
    pub fn view(&self) -> ViewKind {
        self.view
    }

    /// Stops the refresh tasks and waits until their subscriptions are
    /// released.
    pub async fn detach(mut self) {
        self.token.cancel();
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                tracing::warn!(view = %self.view, error = %e, "refresh task ended abnormally");
            }
        }
        tracing::debug!(view = %self.view, "view detached");
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::store::test_support::{alert_at, log_at, now};
    use std::time::Duration;
    use watchpost_core::types::{AlertSeverity, LogLevel};

    fn dashboard() -> (Arc<MemoryStore>, Dashboard<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dash = Dashboard::new(Arc::clone(&store), &TriageConfig::default());
        (store, dash)
    }

    async fn next_generation(rx: &mut watch::Receiver<u64>) -> u64 {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("refresh within timeout")
            .expect("sender alive");
        *rx.borrow_and_update()
    }

    #[test]
    fn view_topics() {
        assert_eq!(ViewKind::LogList.topics(), &[Topic::Logs]);
        assert_eq!(ViewKind::AlertList.topics(), &[Topic::ThreatAlerts]);
        assert_eq!(
            ViewKind::Analytics.topics(),
            &[Topic::Logs, Topic::ThreatAlerts]
        );
        assert_eq!(ViewKind::Stats.topics(), &[Topic::All]);
    }

    #[tokio::test]
    async fn notice_queue_is_bounded() {
        let state = DashboardState::new(2);
        state.push_notice(NoticeLevel::Info, "one").await;
        state.push_notice(NoticeLevel::Info, "two").await;
        state.push_notice(NoticeLevel::Error, "three").await;

        let notices = state.notices().await;
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, "two");
        assert_eq!(notices[1].level, NoticeLevel::Error);

        assert_eq!(state.take_notices().await.len(), 2);
        assert!(state.notices().await.is_empty());
    }

    #[tokio::test]
    async fn attach_loads_view_once() {
        let (store, dash) = dashboard();
        store
            .insert_logs(vec![log_at(LogLevel::Info, "app", "boot", now())])
            .await
            .unwrap();

        assert!(dash.state().is_stale(ViewKind::LogList));
        let live = dash.attach(ViewKind::LogList).await;
        assert_eq!(dash.state().generation(ViewKind::LogList), 1);
        assert!(!dash.state().is_stale(ViewKind::LogList));
        assert_eq!(dash.state().logs().await.len(), 1);
        live.detach().await;
    }

    #[tokio::test]
    async fn live_view_refreshes_on_change() {
        let (store, dash) = dashboard();
        let live = dash.attach(ViewKind::AlertList).await;
        let mut rx = dash.state().watch(ViewKind::AlertList);
        rx.borrow_and_update();

        store
            .insert_alert(alert_at(AlertSeverity::High, now()))
            .await
            .unwrap();
        next_generation(&mut rx).await;
        assert_eq!(dash.state().alerts().await.len(), 1);

        live.detach().await;
    }

    #[tokio::test]
    async fn unrelated_topic_does_not_refresh() {
        let (store, dash) = dashboard();
        let live = dash.attach(ViewKind::AlertList).await;
        let before = dash.state().generation(ViewKind::AlertList);

        store
            .insert_logs(vec![log_at(LogLevel::Error, "app", "x", now())])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(dash.state().generation(ViewKind::AlertList), before);

        live.detach().await;
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let (store, dash) = dashboard();
        let mut resolved = alert_at(AlertSeverity::Low, now());
        resolved.status = AlertStatus::Resolved;
        store.insert_alert(resolved).await.unwrap();
        store
            .insert_alert(alert_at(AlertSeverity::High, now()))
            .await
            .unwrap();
        store
            .insert_logs(vec![
                log_at(LogLevel::Info, "a", "x", now()),
                log_at(LogLevel::Info, "a", "y", now()),
            ])
            .await
            .unwrap();

        dash.refresh(ViewKind::Stats).await.unwrap();
        let stats = dash.state().stats().await.unwrap();
        assert_eq!(
            stats,
            StatsOverview {
                logs_processed: 2,
                active_threats: 1,
                threats_resolved: 1,
                active_sources: 0,
            }
        );
    }

    #[tokio::test]
    async fn invalid_filter_keeps_previous_one() {
        // Given: a working ERROR filter over one matching entry
        let (store, dash) = dashboard();
        store
            .insert_logs(vec![log_at(LogLevel::Error, "app", "disk full", now())])
            .await
            .unwrap();
        let errors = FilterSpec {
            level: Some("ERROR".to_owned()),
            ..Default::default()
        };
        dash.set_filter(errors.clone()).await.unwrap();
        let generation = dash.state().generation(ViewKind::LogList);

        // When: an unknown level is submitted
        let err = dash
            .set_filter(FilterSpec {
                level: Some("LOUD".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        // Then: it is rejected without touching the view
        assert!(matches!(err, TriageError::Validation(_)));
        assert_eq!(dash.state().filter().await, errors);
        assert_eq!(dash.state().generation(ViewKind::LogList), generation);
        assert!(dash.state().notices().await.is_empty());

        // And later refreshes still run the previous filter
        store
            .insert_logs(vec![log_at(LogLevel::Error, "app", "disk gone", now())])
            .await
            .unwrap();
        dash.refresh(ViewKind::LogList).await.unwrap();
        assert_eq!(dash.state().logs().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_becomes_error_notice() {
        let (_store, dash) = dashboard();
        *dash.state().filter.write().await = FilterSpec {
            level: Some("LOUD".to_owned()),
            ..Default::default()
        };

        let err = dash.refresh(ViewKind::LogList).await.unwrap_err();
        assert!(matches!(err, TriageError::Validation(_)));

        let notices = dash.state().notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.starts_with("log_list"));
        assert!(dash.state().is_stale(ViewKind::LogList));
    }

    #[tokio::test]
    async fn detach_releases_subscriptions() {
        let (_store, dash) = dashboard();
        let analytics = dash.attach(ViewKind::Analytics).await;
        let stats = dash.attach(ViewKind::Stats).await;
        assert_eq!(dash.notifier().active_subscriptions(Topic::Logs), 1);
        assert_eq!(dash.notifier().active_subscriptions(Topic::ThreatAlerts), 1);
        assert_eq!(dash.notifier().active_subscriptions(Topic::All), 1);

        analytics.detach().await;
        assert_eq!(dash.notifier().active_subscriptions(Topic::Logs), 0);
        assert_eq!(dash.notifier().active_subscriptions(Topic::All), 1);

        drop(stats);
        for _ in 0..100 {
            if dash.notifier().total_subscriptions() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dash.notifier().total_subscriptions(), 0);
    }

    #[tokio::test]
    async fn views_do_not_share_subscriptions() {
        let (_store, dash) = dashboard();
        let a = dash.attach(ViewKind::LogList).await;
        let b = dash.attach(ViewKind::Analytics).await;
        assert_eq!(dash.notifier().active_subscriptions(Topic::Logs), 2);
        a.detach().await;
        b.detach().await;
    }
}
