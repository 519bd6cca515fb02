//! Clock and cancellable timer queue.
//!
//! The manager never touches an event loop directly. Every delayed step is a
//! [`Task`] placed in a [`TimerQueue`]; whoever drives the manager (a test with
//! a [`ManualClock`], or the tokio service with a [`SystemClock`]) asks for due
//! tasks and feeds them back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::notification::NotificationId;

/// Source of "now" for the manager
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Virtual clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle while the manager
/// owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = deadline_after(*now, by);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// `from + delay`, saturating at the end of representable time
pub(crate) fn deadline_after(from: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    from.checked_add_signed(to_chrono(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Handle returned by [`TimerQueue::schedule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Deferred manager work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Entrance animation finished
    EntranceEnd(NotificationId),
    /// Auto-close delay elapsed
    AutoClose(NotificationId),
    /// Countdown bar refresh
    ProgressTick(NotificationId),
    /// Attention pulse finished
    AttentionEnd(NotificationId),
    /// Exit animation finished, the toast can be detached
    ExitComplete(NotificationId),
    /// Try to admit the next queued request
    AdvanceQueue,
    /// Periodic group expiry and queue sweep
    Sweep,
    /// Bring back persisted notifications
    Restore,
    /// Admit the next item of a running sequence
    SequenceStep(u64),
    /// Delayed builder submission
    Deferred(u64),
    /// Second phase of a progress-then-result notification
    AutoUpdate(NotificationId),
}

/// Ordered set of pending tasks with O(log n) cancel
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_handle: u64,
    entries: BTreeMap<(DateTime<Utc>, TimerHandle), Task>,
    deadlines: HashMap<TimerHandle, DateTime<Utc>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: DateTime<Utc>, delay: Duration, task: Task) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        let deadline = deadline_after(now, delay);
        self.entries.insert((deadline, handle), task);
        self.deadlines.insert(handle, deadline);
        handle
    }

    /// Returns false when the handle already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle) {
            Some(deadline) => self.entries.remove(&(deadline, handle)).is_some(),
            None => false,
        }
    }

    /// Cancel an optional handle slot and clear it
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerHandle>) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
    }

    /// Remove and return the earliest task due at `now`.
    ///
    /// Tasks with equal deadlines come out in scheduling order.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(TimerHandle, Task)> {
        let (&(deadline, handle), _) = self.entries.iter().next()?;
        if deadline > now {
            return None;
        }
        self.deadlines.remove(&handle);
        self.entries
            .remove(&(deadline, handle))
            .map(|task| (handle, task))
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.deadlines.clear();
    }
}
