use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::notification::NotificationId;
use crate::scheduler::deadline_after;

/// Merge state for one grouping key
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub notification_id: NotificationId,
    pub count: u32,
    pub last_message: String,
    pub last_update: DateTime<Utc>,
}

impl GroupEntry {
    fn is_fresh(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now < deadline_after(self.last_update, timeout)
    }
}

/// Similarity table keyed by `type:title`.
///
/// Entries expire lazily on lookup and in bulk on [`GroupTable::sweep`].
#[derive(Debug, Default)]
pub struct GroupTable {
    entries: HashMap<String, GroupEntry>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key` if it was updated within `timeout`; stale entries are dropped
    pub fn fresh(&mut self, key: &str, now: DateTime<Utc>, timeout: Duration) -> Option<&mut GroupEntry> {
        let fresh = self.entries.get(key)?.is_fresh(now, timeout);
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    pub fn register(&mut self, key: String, notification_id: NotificationId, message: String, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            GroupEntry {
                notification_id,
                count: 1,
                last_message: message,
                last_update: now,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<GroupEntry> {
        self.entries.remove(key)
    }

    /// Drop every entry pointing at `id`
    pub fn purge_id(&mut self, id: &NotificationId) {
        self.entries.retain(|_, entry| &entry.notification_id != id);
    }

    /// Drop expired entries; the notifications themselves stay
    pub fn sweep(&mut self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now, timeout));
        before - self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&GroupEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(2000);

    fn ms(n: i64) -> chrono::Duration {
        chrono::Duration::milliseconds(n)
    }

    #[test]
    fn test_lookup_expires_lazily() {
        let now = Utc::now();
        let mut table = GroupTable::new();
        table.register("info:T".into(), NotificationId::from("a"), "m".into(), now);

        assert!(table.fresh("info:T", now + ms(1999), TIMEOUT).is_some());
        assert!(table.fresh("info:T", now + ms(2000), TIMEOUT).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_sweep_and_purge() {
        let now = Utc::now();
        let mut table = GroupTable::new();
        table.register("info:A".into(), NotificationId::from("a"), String::new(), now);
        table.register("info:B".into(), NotificationId::from("b"), String::new(), now + ms(1500));

        assert_eq!(table.sweep(now + ms(2500), TIMEOUT), 1);
        assert!(table.get("info:B").is_some());

        table.purge_id(&NotificationId::from("b"));
        assert!(table.is_empty());
    }
}
