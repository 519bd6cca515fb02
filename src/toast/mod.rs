//! Visual side of a notification.
//!
//! The manager only talks to [`Renderable`] and [`Surface`]; any toolkit can
//! provide them. [`ToastItem`] is a ready-made renderable that diffs fields
//! and redraws only the regions that changed, and [`HeadlessSurface`] keeps the
//! resulting render tree in memory.

mod item;
mod surface;

use std::fmt;

use crate::notification::{Action, CloseReason, NotificationType};

pub use item::{RegionSink, ToastItem};
pub use surface::{HeadlessSink, HeadlessSurface, HeadlessToast, Surface};

/// Observed properties of a toast
#[derive(Debug, Clone, PartialEq)]
pub struct ToastFields {
    pub visible: bool,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub persistent: bool,
    pub show_close_button: bool,
    pub icon: Option<String>,
    pub progress: Option<f32>,
}

/// Independently redrawn parts of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// Outer frame: type styling, visibility and persistence
    Frame,
    Icon,
    Title,
    Message,
    CloseButton,
    Actions,
    Progress,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Frame => "frame",
            Region::Icon => "icon",
            Region::Title => "title",
            Region::Message => "message",
            Region::CloseButton => "close-button",
            Region::Actions => "actions",
            Region::Progress => "progress",
        };
        f.write_str(name)
    }
}

/// Animation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Entering,
    Visible,
    /// Short pulse after a merge or update
    Attention,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Other(char),
}

/// Key press with modifiers, as seen by global shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyChord {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
        }
    }

    pub fn ctrl_shift(key: Key) -> Self {
        Self {
            key,
            ctrl: true,
            shift: true,
        }
    }
}

/// Raw user interaction with one toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastInput {
    /// Click on the toast body
    Click,
    /// Close control activated
    CloseButton,
    /// Key pressed while the toast had focus
    Key(Key),
    /// Action button activated
    Action(String),
}

/// What a toast asks its owner to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastSignal {
    CloseRequested(CloseReason),
    ActionInvoked(String),
}

/// Capability the manager needs from a visual toast
pub trait Renderable: Send {
    /// Bring the toast in line with `fields`
    fn render(&mut self, fields: &ToastFields);

    /// Replace the action buttons
    fn set_actions(&mut self, actions: &[Action]);

    fn set_phase(&mut self, phase: Phase);

    /// Translate an interaction into a signal for the owner
    fn handle_input(&mut self, input: ToastInput) -> Option<ToastSignal>;

    /// Release everything the toast holds. Safe to call more than once.
    fn teardown(&mut self);
}
