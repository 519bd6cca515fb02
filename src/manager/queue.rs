use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::notification::{NotificationOptions, NotificationType};

/// A request waiting for a free slot
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub kind: NotificationType,
    pub options: NotificationOptions,
    pub enqueued_at: DateTime<Utc>,
    /// Original creation time of a restored record
    pub created_at: Option<DateTime<Utc>>,
}

/// Bounded FIFO of pending requests
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<QueueEntry>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless the queue already holds `capacity` entries
    pub fn push(&mut self, entry: QueueEntry, capacity: usize) -> bool {
        if self.entries.len() >= capacity {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> QueueEntry {
        QueueEntry {
            kind: NotificationType::Info,
            options: NotificationOptions::message(message),
            enqueued_at: Utc::now(),
            created_at: None,
        }
    }

    #[test]
    fn test_fifo_with_bound() {
        let mut queue = WaitQueue::new();
        assert!(queue.push(entry("a"), 2));
        assert!(queue.push(entry("b"), 2));
        assert!(!queue.push(entry("c"), 2));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().unwrap().options.message.as_deref(), Some("a"));
        assert_eq!(queue.pop().unwrap().options.message.as_deref(), Some("b"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_zero_capacity_drops_everything() {
        let mut queue = WaitQueue::new();
        assert!(!queue.push(entry("a"), 0));
        assert!(queue.is_empty());
    }
}
