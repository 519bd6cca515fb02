use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ManagerConfig;
use crate::metrics::ToastMetrics;
use crate::notification::{CloseReason, NotificationId, NotificationSnapshot};

/// Event names listeners can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Updated,
    Removed,
    ConfigUpdated,
    Destroyed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Updated => "updated",
            EventKind::Removed => "removed",
            EventKind::ConfigUpdated => "config-updated",
            EventKind::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something observable happened inside the manager
#[derive(Debug, Clone)]
pub enum ToastEvent {
    Added {
        notification: NotificationSnapshot,
        timestamp: DateTime<Utc>,
    },
    Updated {
        notification: NotificationSnapshot,
        timestamp: DateTime<Utc>,
    },
    Removed {
        id: NotificationId,
        reason: CloseReason,
        timestamp: DateTime<Utc>,
    },
    ConfigUpdated {
        config: ManagerConfig,
        timestamp: DateTime<Utc>,
    },
    Destroyed {
        timestamp: DateTime<Utc>,
    },
}

impl ToastEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ToastEvent::Added { .. } => EventKind::Added,
            ToastEvent::Updated { .. } => EventKind::Updated,
            ToastEvent::Removed { .. } => EventKind::Removed,
            ToastEvent::ConfigUpdated { .. } => EventKind::ConfigUpdated,
            ToastEvent::Destroyed { .. } => EventKind::Destroyed,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ToastEvent::Added { timestamp, .. }
            | ToastEvent::Updated { timestamp, .. }
            | ToastEvent::Removed { timestamp, .. }
            | ToastEvent::ConfigUpdated { timestamp, .. }
            | ToastEvent::Destroyed { timestamp } => *timestamp,
        }
    }

    /// Id of the notification involved, if any
    pub fn notification_id(&self) -> Option<&NotificationId> {
        match self {
            ToastEvent::Added { notification, .. } | ToastEvent::Updated { notification, .. } => {
                Some(&notification.id)
            }
            ToastEvent::Removed { id, .. } => Some(id),
            _ => None,
        }
    }
}

pub type EventListener = Arc<dyn Fn(&ToastEvent) -> anyhow::Result<()> + Send + Sync>;

/// Returned by `on`, pass to `off` to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    filter: Option<EventKind>,
    listener: EventListener,
}

/// Listener registry. A failing listener is logged and never stops delivery.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind, or to all of them with `None`
    pub fn subscribe(&mut self, filter: Option<EventKind>, listener: EventListener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.subscriptions.push(Subscription { id, filter, listener });
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() < before
    }

    pub fn emit(&self, event: &ToastEvent) {
        let kind = event.kind();
        for subscription in &self.subscriptions {
            if subscription.filter.is_some_and(|f| f != kind) {
                continue;
            }
            if let Err(e) = (subscription.listener)(event) {
                ToastMetrics::record_callback_failure();
                tracing::warn!(event = %kind, error = %e, "Event listener failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
