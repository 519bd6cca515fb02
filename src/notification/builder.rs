use std::time::Duration;

use tokio::sync::oneshot;

use crate::config::Position;
use crate::error::Result;
use crate::manager::{Admission, ToastManager};

use super::types::{Action, CloseReason, NotificationId, NotificationOptions, NotificationType, Priority};

/// Fluent request assembly.
///
/// Setters only record values; all validation happens when the request is
/// admitted.
pub struct ToastBuilder<'m> {
    manager: &'m mut ToastManager,
    kind: NotificationType,
    options: NotificationOptions,
}

impl<'m> ToastBuilder<'m> {
    pub fn new(manager: &'m mut ToastManager, kind: NotificationType) -> Self {
        Self {
            manager,
            kind,
            options: NotificationOptions::default(),
        }
    }

    pub fn id(mut self, id: impl Into<NotificationId>) -> Self {
        self.options.id = Some(id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.options.title = Some(title.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.options.message = Some(message.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.options.icon = Some(icon.into());
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.options.duration_ms = Some(duration.as_millis() as i64);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.options.persistent = Some(persistent);
        self
    }

    pub fn close_button(mut self, show: bool) -> Self {
        self.options.show_close_button = Some(show);
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.options.position = Some(position);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.options.priority = Some(priority);
        self
    }

    pub fn progress(mut self, progress: f32) -> Self {
        self.options.progress = Some(progress);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.options.show_progress = Some(show);
        self
    }

    pub fn restore_on_load(mut self, restore: bool) -> Self {
        self.options.restore_on_load = Some(restore);
        self
    }

    pub fn group(mut self, group: bool) -> Self {
        self.options.group = Some(group);
        self
    }

    /// Append one action button
    pub fn action(mut self, action: Action) -> Self {
        self.options.actions.get_or_insert_with(Vec::new).push(action);
        self
    }

    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn(&NotificationId, CloseReason) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.options = self.options.with_on_close(callback);
        self
    }

    /// The options assembled so far
    pub fn options(&self) -> &NotificationOptions {
        &self.options
    }

    pub fn show(self) -> Result<Admission> {
        self.manager.notify(self.kind, self.options)
    }

    /// Submit after `delay`. The receiver resolves with the admission result
    /// once the manager's timers have run past the delay.
    pub fn show_after(self, delay: Duration) -> oneshot::Receiver<Result<Admission>> {
        self.manager.notify_after(self.kind, self.options, delay)
    }
}
