//! Notification requests: types, normalization and the fluent builder.

mod builder;
mod normalize;
mod types;

pub use builder::ToastBuilder;
pub use normalize::{group_key, normalize_options, sanitize_text};
pub use types::{
    Action, ActionCallback, ActionContext, CloseCallback, CloseReason, NotificationId,
    NotificationOptions, NotificationSnapshot, NotificationType, Priority,
};
