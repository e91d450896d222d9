//! Change notifier.
//!
//! Turns the datastore's change feed into per-topic [`Subscription`]s. Each
//! active view holds its own subscriptions; nothing is shared or
//! de-duplicated between views, and nothing is buffered for a topic that has
//! no subscriber.
//!
//! A subscriber that falls behind the bounded feed receives one synthetic
//! [`ChangeKind::Lagged`](watchpost_core::event::ChangeKind::Lagged) event so
//! that it still refreshes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use watchpost_core::event::{ChangeEvent, ChangeFeed, Table};
use watchpost_core::metrics as m;

/// A watched subset of the change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `logs` table
    Logs,
    /// `threat_alerts` table
    ThreatAlerts,
    /// Every table
    All,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Logs, Topic::ThreatAlerts, Topic::All];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Logs => "logs",
            Topic::ThreatAlerts => "threat_alerts",
            Topic::All => "all",
        }
    }

    pub fn matches(self, table: Table) -> bool {
        match self {
            Topic::Logs => table == Table::Logs,
            Topic::ThreatAlerts => table == Table::ThreatAlerts,
            Topic::All => true,
        }
    }

    fn index(self) -> usize {
        match self {
            Topic::Logs => 0,
            Topic::ThreatAlerts => 1,
            Topic::All => 2,
        }
    }

    /// Table reported on lag markers.
    fn lag_table(self) -> Table {
        match self {
            Topic::ThreatAlerts => Table::ThreatAlerts,
            Topic::Logs | Topic::All => Table::Logs,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-topic live subscription counts.
#[derive(Debug, Default)]
struct Counters {
    active: [AtomicUsize; 3],
}

impl Counters {
    fn adjust(&self, topic: Topic, delta: isize) {
        let slot = &self.active[topic.index()];
        let now = if delta >= 0 {
            slot.fetch_add(delta.unsigned_abs(), Ordering::SeqCst) + delta.unsigned_abs()
        } else {
            slot.fetch_sub(delta.unsigned_abs(), Ordering::SeqCst) - delta.unsigned_abs()
        };
        metrics::gauge!(m::NOTIFIER_ACTIVE_SUBSCRIPTIONS, m::LABEL_TOPIC => topic.as_str())
            .set(now as f64);
    }
}

/// Hands out topic subscriptions over a [`ChangeFeed`].
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    feed: ChangeFeed,
    counters: Arc<Counters>,
}

impl ChangeNotifier {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            feed,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Opens a subscription. It is released when dropped.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let rx = self.feed.subscribe();
        self.counters.adjust(topic, 1);
        tracing::debug!(topic = %topic, "subscription opened");
        Subscription {
            topic,
            rx,
            counters: Arc::clone(&self.counters),
        }
    }

    /// Live subscriptions on `topic`.
    pub fn active_subscriptions(&self, topic: Topic) -> usize {
        self.counters.active[topic.index()].load(Ordering::SeqCst)
    }

    /// Live subscriptions across all topics.
    pub fn total_subscriptions(&self) -> usize {
        Topic::ALL
            .iter()
            .map(|t| self.active_subscriptions(*t))
            .sum()
    }
}

/// One view's subscription to one topic.
pub struct Subscription {
    topic: Topic,
    rx: broadcast::Receiver<ChangeEvent>,
    counters: Arc<Counters>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Waits for the next change on this topic.
    ///
    /// Returns `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.topic.matches(event.table) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "subscriber lagged");
                    return Some(ChangeEvent::lagged(self.topic.lag_table(), skipped));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Discards every event already queued, returning how many matched.
    pub fn drain_ready(&mut self) -> usize {
        let mut matched = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.topic.matches(event.table) => matched += 1,
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => matched += 1,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return matched,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.counters.adjust(self.topic, -1);
        tracing::debug!(topic = %self.topic, "subscription closed");
    }
}
