//! User input: item interactions and global shortcuts.

use crate::metrics::ToastMetrics;
use crate::notification::{ActionContext, CloseReason, NotificationId};
use crate::toast::{Key, KeyChord, ToastInput, ToastSignal};

use super::ToastManager;

impl ToastManager {
    /// Route an interaction to the toast showing `id`.
    ///
    /// Returns true when the interaction did something.
    pub fn dispatch_input(&mut self, id: &NotificationId, input: ToastInput) -> bool {
        if self.destroyed {
            return false;
        }
        let signal = match self.notifications.get_mut(id) {
            Some(active) if active.removing.is_none() => active.item.handle_input(input),
            _ => return false,
        };

        match signal {
            Some(ToastSignal::CloseRequested(reason)) => self.remove_by_id(id, reason),
            Some(ToastSignal::ActionInvoked(action_id)) => self.invoke_action(id, &action_id),
            None => false,
        }
    }

    /// Run one action callback, then dismiss when the action asks for it.
    /// A failing callback does not stop the dismissal.
    fn invoke_action(&mut self, id: &NotificationId, action_id: &str) -> bool {
        let Some(action) = self
            .notifications
            .get(id)
            .and_then(|active| active.actions.iter().find(|a| a.id() == action_id))
        else {
            tracing::debug!(notification_id = %id, action_id = %action_id, "Unknown action");
            return false;
        };
        let callback = action.callback.clone();
        let dismiss = action.dismiss_on_click;

        if let Some(callback) = callback {
            let context = ActionContext {
                notification_id: id.clone(),
                action_id: action_id.to_string(),
            };
            if let Err(e) = callback(&context) {
                ToastMetrics::record_callback_failure();
                tracing::warn!(notification_id = %id, action_id = %action_id, error = %e, "Action callback failed");
            }
        }
        if dismiss {
            self.remove_by_id(id, CloseReason::Action);
        }
        true
    }

    /// Global shortcuts: Escape dismisses the newest notification,
    /// Ctrl+Shift+X clears the non-persistent ones
    pub fn handle_shortcut(&mut self, chord: KeyChord) -> bool {
        if self.destroyed || !self.config.enable_keyboard_shortcuts {
            return false;
        }

        match chord {
            KeyChord {
                key: Key::Escape,
                ctrl: false,
                shift: false,
            } => {
                let newest = self
                    .order
                    .iter()
                    .rev()
                    .find(|id| !self.is_removing(id))
                    .cloned();
                match newest {
                    Some(id) => self.remove_by_id(&id, CloseReason::Keyboard),
                    None => false,
                }
            }
            KeyChord {
                key: Key::Other(c),
                ctrl: true,
                shift: true,
            } if c.eq_ignore_ascii_case(&'x') => self.clear_non_persistent() > 0,
            _ => false,
        }
    }
}
