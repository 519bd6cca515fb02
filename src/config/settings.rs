use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_visible`
pub const MAX_VISIBLE_LIMIT: i64 = 20;

/// Upper bound accepted for `max_queue`
pub const MAX_QUEUE_LIMIT: usize = 1000;

/// Upper bound accepted for `animation_duration_ms`
pub const MAX_ANIMATION_MS: u64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub manager: ToastConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Screen anchor for a notification container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopCenter,
    #[default]
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::TopLeft,
        Position::TopCenter,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomCenter,
        Position::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::TopLeft => "top-left",
            Position::TopCenter => "top-center",
            Position::TopRight => "top-right",
            Position::BottomLeft => "bottom-left",
            Position::BottomCenter => "bottom-center",
            Position::BottomRight => "bottom-right",
        }
    }

    /// Bottom anchored containers stack newest-last
    pub fn is_bottom(&self) -> bool {
        matches!(
            self,
            Position::BottomLeft | Position::BottomCenter | Position::BottomRight
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown position '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "auto" => Ok(Theme::Auto),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// Raw manager options as read from files, env or callers.
///
/// Nothing here is trusted; `validate` turns it into a `ManagerConfig`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToastConfig {
    #[serde(default = "default_position")]
    pub position: String,
    /// Default auto-close delay in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration_ms: i64,
    /// Entrance/exit animation length in milliseconds
    #[serde(default = "default_animation_ms")]
    pub animation_duration_ms: u64,
    #[serde(default = "default_max_visible")]
    pub max_visible: i64,
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,
    #[serde(default = "default_true")]
    pub group_similar: bool,
    #[serde(default = "default_group_timeout_ms")]
    pub group_timeout_ms: u64,
    #[serde(default)]
    pub enable_persistence: bool,
    #[serde(default = "default_true")]
    pub enable_keyboard_shortcuts: bool,
    #[serde(default)]
    pub enable_sounds: bool,
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Interval of the periodic group-expiry and queue sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_position() -> String {
    Position::default().as_str().to_string()
}

fn default_duration_ms() -> i64 {
    5000
}

fn default_animation_ms() -> u64 {
    300
}

fn default_max_visible() -> i64 {
    5
}

fn default_max_queue() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_group_timeout_ms() -> u64 {
    2000
}

fn default_theme() -> String {
    Theme::default().as_str().to_string()
}

fn default_sweep_interval_ms() -> u64 {
    10_000
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            position: default_position(),
            duration_ms: default_duration_ms(),
            animation_duration_ms: default_animation_ms(),
            max_visible: default_max_visible(),
            max_queue: default_max_queue(),
            group_similar: true,
            group_timeout_ms: default_group_timeout_ms(),
            enable_persistence: false,
            enable_keyboard_shortcuts: true,
            enable_sounds: false,
            theme: default_theme(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Validated manager configuration. Every field holds a usable value.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    pub position: Position,
    pub duration: Duration,
    pub animation_duration: Duration,
    pub max_visible: usize,
    pub max_queue: usize,
    pub group_similar: bool,
    pub group_timeout: Duration,
    pub enable_persistence: bool,
    pub enable_keyboard_shortcuts: bool,
    pub enable_sounds: bool,
    pub theme: Theme,
    pub sweep_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ToastConfig::default().validate()
    }
}

impl ToastConfig {
    /// Replace every invalid value with its documented default.
    ///
    /// Never fails; each substitution is reported with a warning.
    pub fn validate(&self) -> ManagerConfig {
        let position = self.position.parse::<Position>().unwrap_or_else(|e| {
            tracing::warn!(error = %e, fallback = %Position::default(), "Invalid position, using default");
            Position::default()
        });

        let duration_ms = if self.duration_ms < 0 {
            tracing::warn!(
                value = self.duration_ms,
                fallback = default_duration_ms(),
                "Negative duration, using default"
            );
            default_duration_ms()
        } else {
            self.duration_ms
        };

        let animation_ms = if self.animation_duration_ms > MAX_ANIMATION_MS {
            tracing::warn!(
                value = self.animation_duration_ms,
                fallback = default_animation_ms(),
                "Animation duration out of range, using default"
            );
            default_animation_ms()
        } else {
            self.animation_duration_ms
        };

        let max_visible = if (1..=MAX_VISIBLE_LIMIT).contains(&self.max_visible) {
            self.max_visible
        } else {
            tracing::warn!(
                value = self.max_visible,
                min = 1,
                max = MAX_VISIBLE_LIMIT,
                fallback = default_max_visible(),
                "max_visible out of range, using default"
            );
            default_max_visible()
        };

        let max_queue = if self.max_queue > MAX_QUEUE_LIMIT {
            tracing::warn!(
                value = self.max_queue,
                fallback = default_max_queue(),
                "max_queue out of range, using default"
            );
            default_max_queue()
        } else {
            self.max_queue
        };

        let group_timeout_ms = if self.group_timeout_ms == 0 {
            tracing::warn!(fallback = default_group_timeout_ms(), "group_timeout must be positive, using default");
            default_group_timeout_ms()
        } else {
            self.group_timeout_ms
        };

        let theme = self.theme.parse::<Theme>().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid theme, using default");
            Theme::default()
        });

        let sweep_ms = if self.sweep_interval_ms == 0 {
            tracing::warn!(fallback = default_sweep_interval_ms(), "sweep_interval must be positive, using default");
            default_sweep_interval_ms()
        } else {
            self.sweep_interval_ms
        };

        ManagerConfig {
            position,
            duration: Duration::from_millis(duration_ms as u64),
            animation_duration: Duration::from_millis(animation_ms),
            max_visible: max_visible as usize,
            max_queue,
            group_similar: self.group_similar,
            group_timeout: Duration::from_millis(group_timeout_ms),
            enable_persistence: self.enable_persistence,
            enable_keyboard_shortcuts: self.enable_keyboard_shortcuts,
            enable_sounds: self.enable_sounds,
            theme,
            sweep_interval: Duration::from_millis(sweep_ms),
        }
    }
}

impl ManagerConfig {
    /// Back to raw form, so patches can be validated with the same rules
    pub fn to_raw(&self) -> ToastConfig {
        ToastConfig {
            position: self.position.as_str().to_string(),
            duration_ms: self.duration.as_millis() as i64,
            animation_duration_ms: self.animation_duration.as_millis() as u64,
            max_visible: self.max_visible as i64,
            max_queue: self.max_queue,
            group_similar: self.group_similar,
            group_timeout_ms: self.group_timeout.as_millis() as u64,
            enable_persistence: self.enable_persistence,
            enable_keyboard_shortcuts: self.enable_keyboard_shortcuts,
            enable_sounds: self.enable_sounds,
            theme: self.theme.as_str().to_string(),
            sweep_interval_ms: self.sweep_interval.as_millis() as u64,
        }
    }

    /// Apply a partial update and re-validate the result
    pub fn patched(&self, patch: &ConfigPatch) -> ManagerConfig {
        let mut raw = self.to_raw();
        if let Some(ref position) = patch.position {
            raw.position = position.clone();
        }
        if let Some(duration_ms) = patch.duration_ms {
            raw.duration_ms = duration_ms;
        }
        if let Some(animation_ms) = patch.animation_duration_ms {
            raw.animation_duration_ms = animation_ms;
        }
        if let Some(max_visible) = patch.max_visible {
            raw.max_visible = max_visible;
        }
        if let Some(max_queue) = patch.max_queue {
            raw.max_queue = max_queue;
        }
        if let Some(group_similar) = patch.group_similar {
            raw.group_similar = group_similar;
        }
        if let Some(group_timeout_ms) = patch.group_timeout_ms {
            raw.group_timeout_ms = group_timeout_ms;
        }
        if let Some(enabled) = patch.enable_persistence {
            raw.enable_persistence = enabled;
        }
        if let Some(enabled) = patch.enable_keyboard_shortcuts {
            raw.enable_keyboard_shortcuts = enabled;
        }
        if let Some(enabled) = patch.enable_sounds {
            raw.enable_sounds = enabled;
        }
        if let Some(ref theme) = patch.theme {
            raw.theme = theme.clone();
        }
        raw.validate()
    }
}

/// Partial configuration update. Unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_visible: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_similar: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_persistence: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_keyboard_shortcuts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_sounds: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // TOAST__MANAGER__MAX_VISIBLE, TOAST__LOGGING__LEVEL, etc.
            .add_source(
                Environment::with_prefix("TOAST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validated manager configuration
    pub fn manager_config(&self) -> ManagerConfig {
        self.manager.validate()
    }
}
