//! Multi-step flows built on top of the admission pipeline.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::Position;
use crate::error::{Result, ToastError};
use crate::notification::{
    normalize_options, sanitize_text, Action, CloseReason, NotificationId, NotificationOptions,
    NotificationType,
};
use crate::scheduler::Task;

use super::{Admission, EventKind, ToastManager};

/// Icon shown while a loading notification is pending
const LOADING_ICON: &str = "⏳";

pub(super) struct SequenceRun {
    items: VecDeque<(NotificationType, NotificationOptions)>,
    delay: Duration,
    done: oneshot::Sender<()>,
}

pub(super) struct DeferredNotify {
    kind: NotificationType,
    options: NotificationOptions,
    reply: oneshot::Sender<Result<Admission>>,
}

pub(super) struct PendingUpdate {
    kind: NotificationType,
    options: NotificationOptions,
    pub(super) timer: crate::scheduler::TimerHandle,
}

/// Question with confirm and cancel buttons
#[derive(Debug, Clone)]
pub struct ConfirmOptions {
    pub title: Option<String>,
    pub message: String,
    pub kind: NotificationType,
    pub confirm_label: String,
    pub cancel_label: String,
    /// Resolve to `false` when nobody answered in time
    pub timeout: Option<Duration>,
    pub position: Option<Position>,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            title: None,
            message: String::new(),
            kind: NotificationType::Warning,
            confirm_label: "Confirm".to_string(),
            cancel_label: "Cancel".to_string(),
            timeout: None,
            position: None,
        }
    }
}

impl ConfirmOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_labels(mut self, confirm: impl Into<String>, cancel: impl Into<String>) -> Self {
        self.confirm_label = confirm.into();
        self.cancel_label = cancel.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

type Answer = Arc<Mutex<Option<oneshot::Sender<bool>>>>;

/// First answer wins; later ones are ignored
fn answer(slot: &Answer, value: bool) {
    if let Some(tx) = slot.lock().take() {
        let _ = tx.send(value);
    }
}

/// Handle to a notification created by [`ToastManager::loading`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingToast {
    id: NotificationId,
    admission: Admission,
}

impl LoadingToast {
    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    /// How the initial request was admitted
    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    pub fn update_message(&self, manager: &mut ToastManager, message: impl Into<String>) -> bool {
        manager
            .update(&self.id, NotificationOptions::message(message))
            .is_some()
    }

    /// Progress in `0.0..=1.0`
    pub fn update_progress(&self, manager: &mut ToastManager, progress: f32) -> bool {
        let options = NotificationOptions {
            progress: Some(progress),
            ..Default::default()
        };
        manager.update(&self.id, options).is_some()
    }

    /// Turn into a success notification that closes on its own
    pub fn success(self, manager: &mut ToastManager, message: impl Into<String>) -> bool {
        manager.settle(&self.id, NotificationType::Success, message.into())
    }

    /// Turn into an error notification that closes on its own
    pub fn error(self, manager: &mut ToastManager, message: impl Into<String>) -> bool {
        manager.settle(&self.id, NotificationType::Error, message.into())
    }

    pub fn cancel(self, manager: &mut ToastManager) -> bool {
        manager.remove_by_id(&self.id, CloseReason::Manual)
    }
}

impl ToastManager {
    /// Show a persistent "working on it" notification.
    ///
    /// The id is fixed up front, so the handle stays valid even when the
    /// request had to wait in the queue.
    pub fn loading(&mut self, options: impl Into<NotificationOptions>) -> Result<LoadingToast> {
        self.ensure_alive()?;
        let mut options = options.into();
        let id = match options.id.clone() {
            Some(id) => id,
            None => self.next_id(),
        };
        options.id = Some(id.clone());
        options.persistent = Some(true);
        options.group = Some(false);
        options.show_close_button.get_or_insert(false);
        options.icon.get_or_insert_with(|| LOADING_ICON.to_string());

        let admission = self.notify(NotificationType::Info, options)?;
        tracing::debug!(notification_id = %id, admission = ?admission, "Loading notification started");
        Ok(LoadingToast { id, admission })
    }

    fn settle(&mut self, id: &NotificationId, kind: NotificationType, message: String) -> bool {
        let duration = self.config.duration;
        let Some(active) = self.notifications.get_mut(id) else {
            return false;
        };
        if active.removing.is_some() {
            return false;
        }
        active.kind = kind;
        active.message = sanitize_text(&message);
        active.icon = None;
        active.progress = None;
        active.persistent = false;
        active.show_close_button = true;
        active.duration = duration;

        self.arm_auto_close(id);
        self.refresh(id);
        self.pulse_attention(id);
        tracing::debug!(notification_id = %id, kind = %kind, "Loading notification settled");
        self.emit_snapshot(id, EventKind::Updated);
        self.persist();
        true
    }

    /// Ask a yes/no question.
    ///
    /// Resolves `true` on confirm, `false` on cancel, close, timeout or
    /// teardown. A dropped sender means the request never made it on screen.
    pub fn confirm(&mut self, confirm: ConfirmOptions) -> Result<oneshot::Receiver<bool>> {
        self.ensure_alive()?;
        let (tx, rx) = oneshot::channel();
        let slot: Answer = Arc::new(Mutex::new(Some(tx)));

        let on_yes = slot.clone();
        let on_no = slot.clone();
        let on_close = slot;
        let actions = vec![
            Action::new(confirm.confirm_label, move |_| {
                answer(&on_yes, true);
                Ok(())
            })
            .with_id("confirm")
            .primary()
            .dismiss_on_click(),
            Action::new(confirm.cancel_label, move |_| {
                answer(&on_no, false);
                Ok(())
            })
            .with_id("cancel")
            .dismiss_on_click(),
        ];

        let mut options = NotificationOptions {
            title: confirm.title,
            message: Some(confirm.message),
            actions: Some(actions),
            position: confirm.position,
            show_close_button: Some(true),
            group: Some(false),
            ..Default::default()
        }
        .with_on_close(move |_, _| {
            answer(&on_close, false);
            Ok(())
        });
        match confirm.timeout {
            Some(timeout) => {
                options.persistent = Some(false);
                options.duration_ms = Some(timeout.as_millis() as i64);
            }
            None => options.persistent = Some(true),
        }

        let admission = self.notify(confirm.kind, options)?;
        tracing::debug!(admission = ?admission, "Confirmation requested");
        Ok(rx)
    }

    /// Show each request in turn, `delay` apart. Resolves once the last delay
    /// after the final request has elapsed.
    pub fn sequence(
        &mut self,
        items: Vec<(NotificationType, NotificationOptions)>,
        delay: Duration,
    ) -> Result<oneshot::Receiver<()>> {
        self.ensure_alive()?;
        let (done, rx) = oneshot::channel();
        self.job_counter += 1;
        let job = self.job_counter;
        self.sequences.insert(
            job,
            SequenceRun {
                items: items.into(),
                delay,
                done,
            },
        );
        self.step_sequence(job);
        Ok(rx)
    }

    pub(super) fn step_sequence(&mut self, job: u64) {
        let Some(run) = self.sequences.get_mut(&job) else {
            return;
        };
        match run.items.pop_front() {
            Some((kind, options)) => {
                let delay = run.delay;
                if let Err(e) = self.notify(kind, options) {
                    tracing::warn!(job = job, error = %e, "Sequence step failed");
                }
                let now = self.clock.now();
                self.timers.schedule(now, delay, Task::SequenceStep(job));
            }
            None => {
                if let Some(run) = self.sequences.remove(&job) {
                    let _ = run.done.send(());
                }
            }
        }
    }

    /// Submit a request after `delay`; the receiver gets the admission result
    pub fn notify_after(
        &mut self,
        kind: impl Into<NotificationType>,
        options: impl Into<NotificationOptions>,
        delay: Duration,
    ) -> oneshot::Receiver<Result<Admission>> {
        let (reply, rx) = oneshot::channel();
        if self.destroyed {
            let _ = reply.send(Err(ToastError::Destroyed));
            return rx;
        }
        self.job_counter += 1;
        let job = self.job_counter;
        self.deferred.insert(
            job,
            DeferredNotify {
                kind: kind.into(),
                options: options.into(),
                reply,
            },
        );
        let now = self.clock.now();
        self.timers.schedule(now, delay, Task::Deferred(job));
        rx
    }

    pub(super) fn run_deferred(&mut self, job: u64) {
        if let Some(deferred) = self.deferred.remove(&job) {
            let result = self.notify(deferred.kind, deferred.options);
            let _ = deferred.reply.send(result);
        }
    }

    /// Show a notification and replace its content after `after`.
    ///
    /// The follow-up is applied as an in-place update, so the toast keeps its
    /// slot and id. It is skipped if the notification is gone by then.
    pub fn notify_with_auto_update(
        &mut self,
        kind: impl Into<NotificationType>,
        options: impl Into<NotificationOptions>,
        after: Duration,
        next_kind: impl Into<NotificationType>,
        next: NotificationOptions,
    ) -> Result<Admission> {
        let admission = self.notify(kind, options)?;
        if let Some(id) = admission.id() {
            let now = self.clock.now();
            let timer = self.timers.schedule(now, after, Task::AutoUpdate(id.clone()));
            let pending = PendingUpdate {
                kind: next_kind.into(),
                options: next,
                timer,
            };
            if let Some(previous) = self.auto_updates.insert(id.clone(), pending) {
                self.timers.cancel(previous.timer);
            }
        }
        Ok(admission)
    }

    pub(super) fn run_auto_update(&mut self, id: &NotificationId) {
        let Some(pending) = self.auto_updates.remove(id) else {
            return;
        };
        if !self.notifications.contains_key(id) || self.is_removing(id) {
            return;
        }
        let options = normalize_options(pending.options, &mut self.action_counter);
        self.apply_update(id, Some(pending.kind), options);
    }
}
