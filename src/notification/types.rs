use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Position;

/// Identity of an active notification.
///
/// Callers may supply their own; generated ids combine a timestamp with a
/// per-manager counter so two ids minted in the same millisecond never clash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate(counter: u64, now: DateTime<Utc>) -> Self {
        Self(format!("toast-{}-{}", now.timestamp_millis(), counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Visual category of a notification.
///
/// Deserialization is lenient: any unknown name becomes `Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum NotificationType {
    Success,
    Error,
    Warning,
    #[default]
    Info,
    Custom,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Success => "success",
            NotificationType::Error => "error",
            NotificationType::Warning => "warning",
            NotificationType::Info => "info",
            NotificationType::Custom => "custom",
        }
    }

    /// Parse a type name, mapping anything unrecognized to `Custom`
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "success" => NotificationType::Success,
            "error" => NotificationType::Error,
            "warning" => NotificationType::Warning,
            "info" => NotificationType::Info,
            _ => NotificationType::Custom,
        }
    }

    /// Glyph shown when the caller gives no icon
    pub fn default_icon(&self) -> &'static str {
        match self {
            NotificationType::Success => "✓",
            NotificationType::Error => "✕",
            NotificationType::Warning => "⚠",
            NotificationType::Info => "ℹ",
            NotificationType::Custom => "•",
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        NotificationType::parse_lossy(&value)
    }
}

impl From<&str> for NotificationType {
    fn from(value: &str) -> Self {
        NotificationType::parse_lossy(value)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority, waits in the queue like normal
    Low,
    /// Normal priority (default)
    #[default]
    Normal,
    /// High priority, evicts the oldest toast when the screen is full
    High,
    /// Critical priority, same admission rules as high
    Critical,
}

impl Priority {
    /// Get numeric value for priority comparison
    pub fn as_weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }

    /// Whether a full screen should make room for this request
    pub fn evicts(&self) -> bool {
        *self >= Priority::High
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_weight().cmp(&other.as_weight())
    }
}

/// Why a notification went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseReason {
    /// The close control was activated
    CloseButton,
    /// The body was clicked
    Click,
    /// Escape on the item, or the global dismiss shortcut
    Keyboard,
    /// Auto-close timer elapsed
    Timeout,
    /// An action marked `dismiss_on_click` was activated
    Action,
    /// Made room for a high priority request
    Evicted,
    /// `clear_all` / `clear_non_persistent`
    Cleared,
    /// Removed programmatically
    Manual,
    /// Manager teardown
    Destroyed,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::CloseButton => "close-button",
            CloseReason::Click => "click",
            CloseReason::Keyboard => "keyboard",
            CloseReason::Timeout => "timeout",
            CloseReason::Action => "action",
            CloseReason::Evicted => "evicted",
            CloseReason::Cleared => "cleared",
            CloseReason::Manual => "manual",
            CloseReason::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passed to action callbacks
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub notification_id: NotificationId,
    pub action_id: String,
}

pub type ActionCallback = Arc<dyn Fn(&ActionContext) -> anyhow::Result<()> + Send + Sync>;

pub type CloseCallback = Arc<dyn Fn(&NotificationId, CloseReason) -> anyhow::Result<()> + Send + Sync>;

/// A button rendered inside a toast
#[derive(Clone, Default, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub primary: bool,
    /// Remove the toast after the callback ran
    #[serde(default)]
    pub dismiss_on_click: bool,
    #[serde(skip)]
    pub callback: Option<ActionCallback>,
}

impl Action {
    pub fn new<F>(label: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&ActionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: None,
            label: label.into(),
            primary: false,
            dismiss_on_click: false,
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn dismiss_on_click(mut self) -> Self {
        self.dismiss_on_click = true;
        self
    }

    /// Id after normalization; empty only for unnormalized actions
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("primary", &self.primary)
            .field("dismiss_on_click", &self.dismiss_on_click)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Caller request for a single notification.
///
/// Every field is optional; `None` means "use the manager default" on creation
/// and "leave unchanged" on update.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    #[serde(default)]
    pub id: Option<NotificationId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Auto-close delay in milliseconds; negative values clamp to zero
    #[serde(default, rename = "duration")]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub persistent: Option<bool>,
    #[serde(default)]
    pub show_close_button: Option<bool>,
    #[serde(default)]
    pub actions: Option<Vec<Action>>,
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: Option<Position>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Explicit progress value in `0.0..=1.0`
    #[serde(default)]
    pub progress: Option<f32>,
    /// Show a countdown bar while the auto-close timer runs
    #[serde(default)]
    pub show_progress: Option<bool>,
    /// Persisted records with `false` are not brought back on the next start
    #[serde(default)]
    pub restore_on_load: Option<bool>,
    /// Allow merging with similar notifications (defaults to true)
    #[serde(default)]
    pub group: Option<bool>,
    #[serde(skip)]
    pub on_close: Option<CloseCallback>,
}

fn lenient_position<'de, D>(deserializer: D) -> Result<Option<Position>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.parse::<Position>() {
        Ok(position) => Some(position),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid notification position");
            None
        }
    }))
}

impl NotificationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn titled(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<NotificationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as i64);
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_group(mut self, group: bool) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn(&NotificationId, CloseReason) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(callback));
        self
    }
}

impl From<&str> for NotificationOptions {
    fn from(message: &str) -> Self {
        NotificationOptions::message(message)
    }
}

impl From<String> for NotificationOptions {
    fn from(message: String) -> Self {
        NotificationOptions::message(message)
    }
}

impl fmt::Debug for NotificationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationOptions")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("message", &self.message)
            .field("icon", &self.icon)
            .field("duration_ms", &self.duration_ms)
            .field("persistent", &self.persistent)
            .field("show_close_button", &self.show_close_button)
            .field("actions", &self.actions)
            .field("position", &self.position)
            .field("priority", &self.priority)
            .field("progress", &self.progress)
            .field("show_progress", &self.show_progress)
            .field("restore_on_load", &self.restore_on_load)
            .field("group", &self.group)
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

/// Serializable view of an active notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSnapshot {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Displayed title, including any group count suffix
    pub title: String,
    pub message: String,
    pub icon: Option<String>,
    pub persistent: bool,
    pub position: Position,
    pub timestamp: DateTime<Utc>,
    /// How many requests were merged into this toast
    pub count: u32,
}
