//! Notification manager.
//!
//! [`ToastManager`] owns every active notification, one container per screen
//! position, the wait queue and the grouping table. It is a plain `&mut self`
//! state machine: delayed work goes through a [`TimerQueue`], and the owner
//! calls [`ToastManager::run_due`] whenever [`ToastManager::next_deadline`]
//! has passed. Tests drive it with a `ManualClock`; the async service drives it
//! on the tokio runtime.

mod bulk;
mod events;
mod flows;
mod grouping;
mod input;
mod queue;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{ConfigPatch, ManagerConfig, Position};
use crate::error::{Result, ToastError};
use crate::metrics::ToastMetrics;
use crate::notification::{
    group_key, normalize_options, Action, CloseCallback, CloseReason, NotificationId,
    NotificationOptions, NotificationSnapshot, NotificationType, Priority, ToastBuilder,
};
use crate::persistence::{PersistedRecord, Storage};
use crate::scheduler::{Clock, Task, TimerHandle, TimerQueue};
use crate::toast::{Phase, Renderable, Surface, ToastFields};

pub use events::{EventKind, EventListener, ListenerId, ToastEvent};
pub use flows::{ConfirmOptions, LoadingToast};
pub use grouping::{GroupEntry, GroupTable};
pub use queue::{QueueEntry, WaitQueue};

use events::EventBus;
use flows::{DeferredNotify, PendingUpdate, SequenceRun};

/// Length of the pulse shown after a merge or update
pub const ATTENTION_DURATION: Duration = Duration::from_millis(600);

/// Countdown bar refresh interval
pub const PROGRESS_TICK: Duration = Duration::from_millis(100);

/// Delay between queue advancement passes
pub const QUEUE_BACKOFF: Duration = Duration::from_millis(100);

/// Delay before persisted notifications are brought back
pub const RESTORE_DELAY: Duration = Duration::from_millis(1000);

/// Title of the notification shown when a guarded call fails
pub const FALLBACK_ERROR_TITLE: &str = "Something went wrong";

/// Plays a cue when a notification appears
pub trait SoundPlayer: Send {
    fn play(&mut self, kind: NotificationType) -> anyhow::Result<()>;
}

/// Outcome of a `notify` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A new notification is on screen
    Created(NotificationId),
    /// Folded into a similar notification
    Merged(NotificationId),
    /// The request named an active id and updated it in place
    Updated(NotificationId),
    /// Waiting for a free slot
    Queued,
    /// Queue was full
    Dropped,
}

impl Admission {
    /// Id of the notification now showing the request
    pub fn id(&self) -> Option<&NotificationId> {
        match self {
            Admission::Created(id) | Admission::Merged(id) | Admission::Updated(id) => Some(id),
            Admission::Queued | Admission::Dropped => None,
        }
    }

    pub fn into_id(self) -> Option<NotificationId> {
        match self {
            Admission::Created(id) | Admission::Merged(id) | Admission::Updated(id) => Some(id),
            Admission::Queued | Admission::Dropped => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Admission::Created(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    started: DateTime<Utc>,
    duration: Duration,
}

impl Countdown {
    /// Fraction of the auto-close delay still left
    fn remaining(&self, now: DateTime<Utc>) -> f32 {
        let total = self.duration.as_millis() as f64;
        if total <= 0.0 {
            return 0.0;
        }
        let elapsed = (now - self.started).num_milliseconds().max(0) as f64;
        (1.0 - elapsed / total).clamp(0.0, 1.0) as f32
    }
}

struct ActiveNotification {
    id: NotificationId,
    kind: NotificationType,
    title: String,
    message: String,
    icon: Option<String>,
    persistent: bool,
    show_close_button: bool,
    position: Position,
    priority: Priority,
    duration: Duration,
    show_progress: bool,
    progress: Option<f32>,
    restore_on_load: bool,
    actions: Vec<Action>,
    on_close: Option<CloseCallback>,
    created_at: DateTime<Utc>,
    count: u32,
    item: Box<dyn Renderable>,
    countdown: Option<Countdown>,
    entrance_timer: Option<TimerHandle>,
    auto_close: Option<TimerHandle>,
    progress_timer: Option<TimerHandle>,
    attention_timer: Option<TimerHandle>,
    exit_timer: Option<TimerHandle>,
    /// Set once removal started; the exit animation is running
    removing: Option<CloseReason>,
}

impl ActiveNotification {
    fn display_title(&self) -> String {
        if self.count > 1 {
            format!("{} ({})", self.title, self.count)
        } else {
            self.title.clone()
        }
    }

    fn fields(&self, now: DateTime<Utc>) -> ToastFields {
        ToastFields {
            visible: self.removing.is_none(),
            kind: self.kind,
            title: self.display_title(),
            message: self.message.clone(),
            persistent: self.persistent,
            show_close_button: self.show_close_button,
            icon: self.icon.clone(),
            progress: self
                .progress
                .or_else(|| self.countdown.map(|c| c.remaining(now))),
        }
    }

    fn snapshot(&self) -> NotificationSnapshot {
        NotificationSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            title: self.display_title(),
            message: self.message.clone(),
            icon: self.icon.clone(),
            persistent: self.persistent,
            position: self.position,
            timestamp: self.created_at,
            count: self.count,
        }
    }

    fn cancel_timers(&mut self, timers: &mut TimerQueue) {
        timers.cancel_slot(&mut self.entrance_timer);
        timers.cancel_slot(&mut self.auto_close);
        timers.cancel_slot(&mut self.progress_timer);
        timers.cancel_slot(&mut self.attention_timer);
        timers.cancel_slot(&mut self.exit_timer);
        self.countdown = None;
    }
}

fn millis(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

fn run_close_callback(callback: &CloseCallback, id: &NotificationId, reason: CloseReason) {
    if let Err(e) = callback(id, reason) {
        ToastMetrics::record_callback_failure();
        tracing::warn!(notification_id = %id, reason = %reason, error = %e, "Close callback failed");
    }
}

/// Owner of all on-screen notifications
pub struct ToastManager {
    config: ManagerConfig,
    surface: Box<dyn Surface>,
    clock: Arc<dyn Clock>,
    timers: TimerQueue,
    notifications: HashMap<NotificationId, ActiveNotification>,
    /// Insertion order, oldest first
    order: VecDeque<NotificationId>,
    containers: BTreeSet<Position>,
    groups: GroupTable,
    queue: WaitQueue,
    events: EventBus,
    storage: Option<Arc<dyn Storage>>,
    sound: Option<Box<dyn SoundPlayer>>,
    id_counter: u64,
    action_counter: u64,
    job_counter: u64,
    advancing: bool,
    advance_timer: Option<TimerHandle>,
    sweep_timer: Option<TimerHandle>,
    restore_timer: Option<TimerHandle>,
    sequences: HashMap<u64, SequenceRun>,
    deferred: HashMap<u64, DeferredNotify>,
    auto_updates: HashMap<NotificationId, PendingUpdate>,
    /// Fresh stored records that found no room during restore
    unrestored: Vec<PersistedRecord>,
    destroyed: bool,
}

impl ToastManager {
    pub fn new(config: ManagerConfig, surface: Box<dyn Surface>, clock: Arc<dyn Clock>) -> Self {
        let mut manager = Self {
            config,
            surface,
            clock,
            timers: TimerQueue::new(),
            notifications: HashMap::new(),
            order: VecDeque::new(),
            containers: BTreeSet::new(),
            groups: GroupTable::new(),
            queue: WaitQueue::new(),
            events: EventBus::new(),
            storage: None,
            sound: None,
            id_counter: 0,
            action_counter: 0,
            job_counter: 0,
            advancing: false,
            advance_timer: None,
            sweep_timer: None,
            restore_timer: None,
            sequences: HashMap::new(),
            deferred: HashMap::new(),
            auto_updates: HashMap::new(),
            unrestored: Vec::new(),
            destroyed: false,
        };

        manager.surface.set_theme(manager.config.theme);
        manager.schedule_sweep();

        tracing::info!(
            position = %manager.config.position,
            max_visible = manager.config.max_visible,
            max_queue = manager.config.max_queue,
            group_similar = manager.config.group_similar,
            "Toast manager initialized"
        );

        manager
    }

    /// Attach a storage backend; persisted notifications come back after
    /// [`RESTORE_DELAY`] when persistence is enabled
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        if self.config.enable_persistence && self.restore_timer.is_none() {
            let now = self.clock.now();
            self.restore_timer = Some(self.timers.schedule(now, RESTORE_DELAY, Task::Restore));
        }
        self
    }

    pub fn with_sound(mut self, player: Box<dyn SoundPlayer>) -> Self {
        self.sound = Some(player);
        self
    }

    // ========================================================================
    // Creation API
    // ========================================================================

    /// Admit a request: update, merge, create, queue or drop it
    pub fn notify(
        &mut self,
        kind: impl Into<NotificationType>,
        options: impl Into<NotificationOptions>,
    ) -> Result<Admission> {
        self.admit(kind.into(), options.into(), None)
    }

    /// Like [`notify`](Self::notify), but a failure shows a generic error
    /// notification instead of returning an error
    pub fn notify_guarded(
        &mut self,
        kind: impl Into<NotificationType>,
        options: impl Into<NotificationOptions>,
    ) -> Option<NotificationId> {
        let error = match self.notify(kind, options) {
            Ok(admission) => return admission.into_id(),
            Err(e) => e,
        };

        tracing::error!(error = %error, code = error.code(), "Notification failed, showing fallback");
        if matches!(error, ToastError::Destroyed) {
            return None;
        }

        let fallback = NotificationOptions::titled(FALLBACK_ERROR_TITLE, error.to_string());
        match self.notify(NotificationType::Error, fallback) {
            Ok(admission) => admission.into_id(),
            Err(e) => {
                tracing::error!(error = %e, "Fallback notification failed, giving up");
                None
            }
        }
    }

    pub fn success(&mut self, options: impl Into<NotificationOptions>) -> Result<Admission> {
        self.notify(NotificationType::Success, options)
    }

    pub fn error(&mut self, options: impl Into<NotificationOptions>) -> Result<Admission> {
        self.notify(NotificationType::Error, options)
    }

    pub fn warning(&mut self, options: impl Into<NotificationOptions>) -> Result<Admission> {
        self.notify(NotificationType::Warning, options)
    }

    pub fn info(&mut self, options: impl Into<NotificationOptions>) -> Result<Admission> {
        self.notify(NotificationType::Info, options)
    }

    pub fn custom(&mut self, options: impl Into<NotificationOptions>) -> Result<Admission> {
        self.notify(NotificationType::Custom, options)
    }

    /// Start a fluent request
    pub fn build(&mut self, kind: impl Into<NotificationType>) -> ToastBuilder<'_> {
        ToastBuilder::new(self, kind.into())
    }

    /// Change an active notification in place. Unknown ids are ignored.
    pub fn update(&mut self, id: &NotificationId, options: NotificationOptions) -> Option<NotificationId> {
        if self.destroyed || !self.notifications.contains_key(id) {
            return None;
        }
        let options = normalize_options(options, &mut self.action_counter);
        self.apply_update(id, None, options);
        Some(id.clone())
    }

    /// Start removing a notification.
    ///
    /// Returns false for unknown ids and for ids already on their way out.
    /// The notification stays attached until the exit animation finished.
    pub fn remove_by_id(&mut self, id: &NotificationId, reason: CloseReason) -> bool {
        if self.destroyed || !self.start_exit(id, reason) {
            return false;
        }
        let now = self.clock.now();
        let handle = self
            .timers
            .schedule(now, self.config.animation_duration, Task::ExitComplete(id.clone()));
        if let Some(active) = self.notifications.get_mut(id) {
            active.exit_timer = Some(handle);
        }
        true
    }

    /// Remove every notification (persistent ones only when asked) and empty the queue
    pub fn clear_all(&mut self, include_persistent: bool) -> usize {
        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::debug!(dropped = dropped, "Cleared wait queue");
        }
        if include_persistent && !self.unrestored.is_empty() {
            self.unrestored.clear();
            self.persist();
        }
        let removed = self.remove_where(|active| include_persistent || !active.persistent, CloseReason::Cleared);
        self.refresh_gauges();
        removed
    }

    /// Remove every non-persistent notification; the queue is left alone
    pub fn clear_non_persistent(&mut self) -> usize {
        self.remove_where(|active| !active.persistent, CloseReason::Cleared)
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Run every task whose deadline has passed
    pub fn run_due(&mut self) -> usize {
        let mut fired = 0;
        while !self.destroyed {
            let now = self.clock.now();
            let Some((_, task)) = self.timers.pop_due(now) else {
                break;
            };
            self.handle_task(task);
            fired += 1;
        }
        fired
    }

    /// When [`run_due`](Self::run_due) next has work
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn handle_task(&mut self, task: Task) {
        tracing::trace!(task = ?task, "Running timer task");
        match task {
            Task::EntranceEnd(id) => {
                if let Some(active) = self.notifications.get_mut(&id) {
                    active.entrance_timer = None;
                    if active.removing.is_none() && active.attention_timer.is_none() {
                        active.item.set_phase(Phase::Visible);
                    }
                }
            }
            Task::AutoClose(id) => {
                if let Some(active) = self.notifications.get_mut(&id) {
                    active.auto_close = None;
                }
                self.remove_by_id(&id, CloseReason::Timeout);
            }
            Task::ProgressTick(id) => self.tick_progress(&id),
            Task::AttentionEnd(id) => {
                if let Some(active) = self.notifications.get_mut(&id) {
                    active.attention_timer = None;
                    if active.removing.is_none() {
                        active.item.set_phase(Phase::Visible);
                    }
                }
            }
            Task::ExitComplete(id) => {
                if let Some(active) = self.notifications.get_mut(&id) {
                    active.exit_timer = None;
                }
                self.finish_removal(&id);
            }
            Task::AdvanceQueue => {
                self.advance_timer = None;
                self.advance_queue();
            }
            Task::Sweep => {
                self.sweep_timer = None;
                let now = self.clock.now();
                let expired = self.groups.sweep(now, self.config.group_timeout);
                if expired > 0 {
                    tracing::debug!(expired = expired, "Expired notification groups");
                }
                self.advance_queue();
                self.schedule_sweep();
            }
            Task::Restore => {
                self.restore_timer = None;
                self.restore();
            }
            Task::SequenceStep(job) => self.step_sequence(job),
            Task::Deferred(job) => self.run_deferred(job),
            Task::AutoUpdate(id) => self.run_auto_update(&id),
        }
    }

    fn schedule_sweep(&mut self) {
        let now = self.clock.now();
        self.timers.cancel_slot(&mut self.sweep_timer);
        self.sweep_timer = Some(self.timers.schedule(now, self.config.sweep_interval, Task::Sweep));
    }

    fn tick_progress(&mut self, id: &NotificationId) {
        let now = self.clock.now();
        let Some(active) = self.notifications.get_mut(id) else {
            return;
        };
        active.progress_timer = None;
        if active.removing.is_some() || active.countdown.is_none() {
            return;
        }
        let fields = active.fields(now);
        active.item.render(&fields);
        active.progress_timer = Some(self.timers.schedule(now, PROGRESS_TICK, Task::ProgressTick(id.clone())));
    }

    // ========================================================================
    // Events & configuration
    // ========================================================================

    /// Subscribe to one event kind
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ToastEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.subscribe(Some(kind), Arc::new(listener))
    }

    /// Subscribe to every event
    pub fn on_all<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&ToastEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.subscribe(None, Arc::new(listener))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Apply a partial configuration change, validated like the initial one
    pub fn update_config(&mut self, patch: ConfigPatch) -> Result<()> {
        self.ensure_alive()?;
        let previous = self.config.clone();
        self.config = previous.patched(&patch);

        if self.config.theme != previous.theme {
            self.surface.set_theme(self.config.theme);
        }
        if self.config.sweep_interval != previous.sweep_interval {
            self.schedule_sweep();
        }
        while self.notifications.len() > self.config.max_visible {
            if !self.evict_oldest() {
                break;
            }
        }
        if self.config.max_visible > previous.max_visible {
            self.advance_queue();
        }
        if self.config.enable_persistence && !previous.enable_persistence {
            self.persist();
        }

        tracing::info!(
            max_visible = self.config.max_visible,
            position = %self.config.position,
            theme = %self.config.theme,
            "Toast configuration updated"
        );
        let timestamp = self.clock.now();
        self.events.emit(&ToastEvent::ConfigUpdated {
            config: self.config.clone(),
            timestamp,
        });
        self.refresh_gauges();
        Ok(())
    }

    /// Tear everything down. Later calls that create notifications fail with
    /// [`ToastError::Destroyed`].
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        let ids: Vec<NotificationId> = self.order.drain(..).collect();
        for id in ids {
            let Some(mut active) = self.notifications.remove(&id) else {
                continue;
            };
            active.cancel_timers(&mut self.timers);
            active.item.teardown();
            self.surface.detach(active.position, &id);
            if active.removing.is_none() {
                if let Some(ref callback) = active.on_close {
                    run_close_callback(callback, &id, CloseReason::Destroyed);
                }
            }
        }
        for position in std::mem::take(&mut self.containers) {
            self.surface.unmount_container(position);
        }

        self.timers.clear();
        self.queue.clear();
        self.groups.clear();
        self.sequences.clear();
        self.deferred.clear();
        self.auto_updates.clear();
        self.unrestored.clear();
        self.advance_timer = None;
        self.sweep_timer = None;
        self.restore_timer = None;
        self.destroyed = true;

        let timestamp = self.clock.now();
        self.events.emit(&ToastEvent::Destroyed { timestamp });
        self.events.clear();
        ToastMetrics::set_sizes(0, 0);
        tracing::info!("Toast manager destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn get(&self, id: &NotificationId) -> Option<NotificationSnapshot> {
        self.notifications.get(id).map(ActiveNotification::snapshot)
    }

    /// Active notifications, oldest first
    pub fn active(&self) -> Vec<NotificationSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.notifications.get(id))
            .map(ActiveNotification::snapshot)
            .collect()
    }

    /// Includes notifications still running their exit animation
    pub fn active_count(&self) -> usize {
        self.notifications.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Merge count of a live group
    pub fn group_count(&self, key: &str) -> Option<u32> {
        self.groups.get(key).map(|entry| entry.count)
    }

    pub fn group_len(&self) -> usize {
        self.groups.len()
    }

    pub fn container_positions(&self) -> Vec<Position> {
        self.containers.iter().copied().collect()
    }

    pub fn is_removing(&self, id: &NotificationId) -> bool {
        self.notifications
            .get(id)
            .is_some_and(|active| active.removing.is_some())
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    // ========================================================================
    // Admission pipeline
    // ========================================================================

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(ToastError::Destroyed);
        }
        Ok(())
    }

    fn next_id(&mut self) -> NotificationId {
        self.id_counter += 1;
        NotificationId::generate(self.id_counter, self.clock.now())
    }

    fn has_capacity(&self) -> bool {
        self.notifications.len() < self.config.max_visible
    }

    fn admit(
        &mut self,
        kind: NotificationType,
        options: NotificationOptions,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<Admission> {
        self.ensure_alive()?;
        let options = normalize_options(options, &mut self.action_counter);

        if let Some(id) = options.id.clone() {
            if self.notifications.contains_key(&id) {
                self.apply_update(&id, Some(kind), options);
                return Ok(Admission::Updated(id));
            }
        }

        let now = self.clock.now();
        let key = if self.config.group_similar && options.group.unwrap_or(true) {
            group_key(kind.as_str(), options.title.as_deref())
        } else {
            None
        };
        if let Some(ref key) = key {
            if let Some(id) = self.try_merge(key, &options, now) {
                return Ok(Admission::Merged(id));
            }
        }

        if !self.has_capacity() {
            if options.priority.unwrap_or_default().evicts() {
                while !self.has_capacity() {
                    if !self.evict_oldest() {
                        break;
                    }
                }
            } else {
                return Ok(self.enqueue(kind, options, now, created_at));
            }
        }

        let id = self.create(kind, options, key, created_at.unwrap_or(now))?;
        Ok(Admission::Created(id))
    }

    fn try_merge(&mut self, key: &str, options: &NotificationOptions, now: DateTime<Utc>) -> Option<NotificationId> {
        let entry = self.groups.fresh(key, now, self.config.group_timeout)?;
        let id = entry.notification_id.clone();
        let live = self
            .notifications
            .get(&id)
            .is_some_and(|active| active.removing.is_none());
        if !live {
            self.groups.remove(key);
            return None;
        }

        entry.count += 1;
        entry.last_update = now;
        if let Some(ref message) = options.message {
            entry.last_message = message.clone();
        }
        let count = entry.count;

        let mut persistent = false;
        if let Some(active) = self.notifications.get_mut(&id) {
            active.count = count;
            if let Some(ref message) = options.message {
                active.message = message.clone();
            }
            persistent = active.persistent;
        }
        self.arm_auto_close(&id);
        self.refresh(&id);
        self.pulse_attention(&id);
        if persistent {
            self.persist();
        }

        ToastMetrics::record_merged();
        tracing::debug!(notification_id = %id, group = %key, count = count, "Merged into existing notification");
        self.emit_snapshot(&id, EventKind::Updated);
        Some(id)
    }

    fn enqueue(
        &mut self,
        kind: NotificationType,
        options: NotificationOptions,
        now: DateTime<Utc>,
        created_at: Option<DateTime<Utc>>,
    ) -> Admission {
        let entry = QueueEntry {
            kind,
            options,
            enqueued_at: now,
            created_at,
        };
        if self.queue.push(entry, self.config.max_queue) {
            ToastMetrics::record_queued();
            tracing::debug!(kind = %kind, queued = self.queue.len(), "Screen full, request queued");
            self.refresh_gauges();
            Admission::Queued
        } else {
            ToastMetrics::record_dropped();
            tracing::warn!(kind = %kind, max_queue = self.config.max_queue, "Wait queue full, dropping request");
            Admission::Dropped
        }
    }

    fn ensure_container(&mut self, position: Position) -> Result<()> {
        if !self.containers.contains(&position) {
            self.surface.mount_container(position)?;
            self.containers.insert(position);
        }
        Ok(())
    }

    fn create(
        &mut self,
        kind: NotificationType,
        options: NotificationOptions,
        key: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<NotificationId> {
        let now = self.clock.now();
        let id = match options.id.clone() {
            Some(id) => id,
            None => self.next_id(),
        };
        let position = options.position.unwrap_or(self.config.position);
        self.ensure_container(position)?;
        let item = self.surface.create_item(&id)?;

        let message = options.message.unwrap_or_default();
        let mut active = ActiveNotification {
            id: id.clone(),
            kind,
            title: options.title.unwrap_or_default(),
            message: message.clone(),
            icon: options.icon,
            persistent: options.persistent.unwrap_or(false),
            show_close_button: options.show_close_button.unwrap_or(true),
            position,
            priority: options.priority.unwrap_or_default(),
            duration: options.duration_ms.map(millis).unwrap_or(self.config.duration),
            show_progress: options.show_progress.unwrap_or(false),
            progress: options.progress,
            restore_on_load: options.restore_on_load.unwrap_or(true),
            actions: options.actions.unwrap_or_default(),
            on_close: options.on_close,
            created_at,
            count: 1,
            item,
            countdown: None,
            entrance_timer: None,
            auto_close: None,
            progress_timer: None,
            attention_timer: None,
            exit_timer: None,
            removing: None,
        };
        active.item.set_actions(&active.actions);
        active.item.set_phase(Phase::Entering);
        active.entrance_timer = Some(self.timers.schedule(
            now,
            self.config.animation_duration,
            Task::EntranceEnd(id.clone()),
        ));
        let persistent = active.persistent;
        let priority = active.priority;

        self.notifications.insert(id.clone(), active);
        self.order.push_back(id.clone());
        self.arm_auto_close(&id);
        self.refresh(&id);
        self.surface.attach(position, &id);
        if let Some(key) = key {
            self.groups.register(key, id.clone(), message, now);
        }
        if self.config.enable_sounds {
            self.play_sound(kind);
        }

        ToastMetrics::record_created(kind.as_str());
        self.refresh_gauges();
        tracing::debug!(
            notification_id = %id,
            kind = %kind,
            position = %position,
            priority = ?priority,
            persistent = persistent,
            "Notification created"
        );
        self.emit_snapshot(&id, EventKind::Added);
        if persistent {
            self.persist();
        }
        Ok(id)
    }

    fn apply_update(&mut self, id: &NotificationId, kind: Option<NotificationType>, options: NotificationOptions) {
        let Some(active) = self.notifications.get_mut(id) else {
            return;
        };
        let was_persistent = active.persistent;
        let old_position = active.position;

        if let Some(kind) = kind {
            active.kind = kind;
        }
        if let Some(title) = options.title {
            active.title = title;
        }
        if let Some(message) = options.message {
            active.message = message;
        }
        if options.icon.is_some() {
            active.icon = options.icon;
        }
        if let Some(persistent) = options.persistent {
            active.persistent = persistent;
        }
        if let Some(show) = options.show_close_button {
            active.show_close_button = show;
        }
        if let Some(position) = options.position {
            active.position = position;
        }
        if let Some(priority) = options.priority {
            active.priority = priority;
        }
        if let Some(ms) = options.duration_ms {
            active.duration = millis(ms);
        }
        if let Some(show) = options.show_progress {
            active.show_progress = show;
        }
        if options.progress.is_some() {
            active.progress = options.progress;
        }
        if let Some(restore) = options.restore_on_load {
            active.restore_on_load = restore;
        }
        if options.on_close.is_some() {
            active.on_close = options.on_close;
        }
        if let Some(actions) = options.actions {
            active.actions = actions;
            active.item.set_actions(&active.actions);
        }

        let rearm = !active.persistent
            && (options.duration_ms.is_some() || options.show_progress.is_some() || was_persistent);
        if active.persistent {
            self.timers.cancel_slot(&mut active.auto_close);
            self.timers.cancel_slot(&mut active.progress_timer);
            active.countdown = None;
        }
        let new_position = active.position;

        if new_position != old_position {
            self.move_container(id, old_position, new_position);
        }
        if rearm {
            self.arm_auto_close(id);
        }
        self.refresh(id);
        self.pulse_attention(id);

        ToastMetrics::record_updated();
        tracing::debug!(notification_id = %id, "Notification updated");
        self.emit_snapshot(id, EventKind::Updated);
        self.persist();
    }

    fn move_container(&mut self, id: &NotificationId, from: Position, to: Position) {
        if let Err(e) = self.ensure_container(to) {
            tracing::warn!(notification_id = %id, position = %to, error = %e, "Cannot move notification");
            if let Some(active) = self.notifications.get_mut(id) {
                active.position = from;
            }
            return;
        }
        self.surface.detach(from, id);
        self.surface.attach(to, id);
    }

    fn arm_auto_close(&mut self, id: &NotificationId) {
        let now = self.clock.now();
        let Some(active) = self.notifications.get_mut(id) else {
            return;
        };
        self.timers.cancel_slot(&mut active.auto_close);
        self.timers.cancel_slot(&mut active.progress_timer);
        active.countdown = None;

        // Zero duration means the toast stays until dismissed
        if active.persistent || active.removing.is_some() || active.duration.is_zero() {
            return;
        }

        active.auto_close = Some(self.timers.schedule(now, active.duration, Task::AutoClose(id.clone())));
        if active.show_progress {
            active.countdown = Some(Countdown {
                started: now,
                duration: active.duration,
            });
            active.progress_timer = Some(self.timers.schedule(now, PROGRESS_TICK, Task::ProgressTick(id.clone())));
        }
    }

    fn refresh(&mut self, id: &NotificationId) {
        let now = self.clock.now();
        if let Some(active) = self.notifications.get_mut(id) {
            let fields = active.fields(now);
            active.item.render(&fields);
        }
    }

    fn pulse_attention(&mut self, id: &NotificationId) {
        let now = self.clock.now();
        let Some(active) = self.notifications.get_mut(id) else {
            return;
        };
        if active.removing.is_some() {
            return;
        }
        self.timers.cancel_slot(&mut active.attention_timer);
        active.item.set_phase(Phase::Attention);
        active.attention_timer = Some(self.timers.schedule(now, ATTENTION_DURATION, Task::AttentionEnd(id.clone())));
    }

    fn play_sound(&mut self, kind: NotificationType) {
        if let Some(player) = self.sound.as_mut() {
            if let Err(e) = player.play(kind) {
                tracing::warn!(kind = %kind, error = %e, "Failed to play notification sound");
            }
        }
    }

    fn emit_snapshot(&self, id: &NotificationId, kind: EventKind) {
        let Some(notification) = self.get(id) else {
            return;
        };
        let timestamp = self.clock.now();
        let event = match kind {
            EventKind::Added => ToastEvent::Added { notification, timestamp },
            _ => ToastEvent::Updated { notification, timestamp },
        };
        self.events.emit(&event);
    }

    fn refresh_gauges(&self) {
        ToastMetrics::set_sizes(self.notifications.len(), self.queue.len());
    }

    // ========================================================================
    // Removal & queue
    // ========================================================================

    /// First half of removal: exit state, timers cancelled, close callback run
    fn start_exit(&mut self, id: &NotificationId, reason: CloseReason) -> bool {
        let now = self.clock.now();
        let Some(active) = self.notifications.get_mut(id) else {
            return false;
        };
        if active.removing.is_some() {
            return false;
        }

        active.removing = Some(reason);
        self.timers.cancel_slot(&mut active.entrance_timer);
        self.timers.cancel_slot(&mut active.auto_close);
        self.timers.cancel_slot(&mut active.progress_timer);
        self.timers.cancel_slot(&mut active.attention_timer);
        active.countdown = None;
        active.item.set_phase(Phase::Exiting);
        let fields = active.fields(now);
        active.item.render(&fields);
        let callback = active.on_close.clone();

        tracing::debug!(notification_id = %id, reason = %reason, "Removing notification");
        if let Some(callback) = callback {
            run_close_callback(&callback, id, reason);
        }
        true
    }

    /// Second half of removal: detach and forget, then let the queue move
    fn finish_removal(&mut self, id: &NotificationId) {
        if self.forget(id) {
            self.advance_queue();
        }
    }

    fn forget(&mut self, id: &NotificationId) -> bool {
        let Some(mut active) = self.notifications.remove(id) else {
            return false;
        };
        self.order.retain(|existing| existing != id);
        active.cancel_timers(&mut self.timers);
        active.item.teardown();
        self.surface.detach(active.position, id);
        self.groups.purge_id(id);
        if let Some(pending) = self.auto_updates.remove(id) {
            self.timers.cancel(pending.timer);
        }

        let reason = active.removing.unwrap_or(CloseReason::Manual);
        ToastMetrics::record_removed(reason.as_str());
        self.refresh_gauges();
        tracing::debug!(notification_id = %id, reason = %reason, "Notification removed");

        let timestamp = self.clock.now();
        self.events.emit(&ToastEvent::Removed {
            id: id.clone(),
            reason,
            timestamp,
        });
        if active.persistent {
            self.persist();
        }
        true
    }

    /// Remove the oldest notification immediately, skipping the exit delay
    fn evict_oldest(&mut self) -> bool {
        let Some(id) = self.order.front().cloned() else {
            return false;
        };
        ToastMetrics::record_evicted();
        tracing::debug!(notification_id = %id, "Evicting oldest notification");
        self.start_exit(&id, CloseReason::Evicted);
        self.forget(&id)
    }

    fn remove_where<F>(&mut self, predicate: F, reason: CloseReason) -> usize
    where
        F: Fn(&ActiveNotification) -> bool,
    {
        let ids: Vec<NotificationId> = self
            .order
            .iter()
            .filter(|id| {
                self.notifications
                    .get(*id)
                    .is_some_and(|active| active.removing.is_none() && predicate(active))
            })
            .cloned()
            .collect();
        ids.iter().filter(|id| self.remove_by_id(id, reason)).count()
    }

    /// Admit the head of the wait queue if a slot is free.
    ///
    /// One request per pass; if more could fit, another pass is scheduled
    /// after [`QUEUE_BACKOFF`].
    fn advance_queue(&mut self) {
        if self.advancing || self.destroyed {
            return;
        }
        self.advancing = true;

        if self.has_capacity() {
            if let Some(entry) = self.queue.pop() {
                tracing::debug!(kind = %entry.kind, remaining = self.queue.len(), "Admitting queued request");
                if let Err(e) = self.admit(entry.kind, entry.options, entry.created_at) {
                    tracing::warn!(error = %e, "Queued request could not be shown");
                }
            }
        }

        if !self.queue.is_empty() && self.has_capacity() && self.advance_timer.is_none() {
            let now = self.clock.now();
            self.advance_timer = Some(self.timers.schedule(now, QUEUE_BACKOFF, Task::AdvanceQueue));
        }
        self.refresh_gauges();
        self.advancing = false;
    }
}

#[cfg(test)]
mod tests;
