//! Manager configuration: raw settings, validation and file/env loading.

mod settings;

pub use settings::{
    ConfigPatch, LoggingConfig, ManagerConfig, Position, Settings, Theme, ToastConfig,
    MAX_ANIMATION_MS, MAX_QUEUE_LIMIT, MAX_VISIBLE_LIMIT,
};
