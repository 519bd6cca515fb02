// Shared building blocks
pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;

// Notification model and rendering
pub mod notification;
pub mod toast;

// Manager and its surroundings
pub mod manager;
pub mod persistence;
pub mod service;

// Supporting modules
pub mod telemetry;

pub use config::{ConfigPatch, ManagerConfig, Position, Settings, Theme, ToastConfig};
pub use error::{Result, ToastError};
pub use manager::{Admission, ConfirmOptions, EventKind, LoadingToast, ToastEvent, ToastManager};
pub use notification::{
    Action, CloseReason, NotificationId, NotificationOptions, NotificationType, Priority,
};
pub use persistence::{FileStorage, MemoryStorage, Storage};
pub use scheduler::{Clock, ManualClock, SystemClock};
pub use service::{ToastHandle, ToastService};
pub use toast::{HeadlessSurface, Surface};
