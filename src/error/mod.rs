use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToastError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Callback failed: {0}")]
    Callback(String),

    #[error("Notification manager has been destroyed")]
    Destroyed,

    #[error("Toast service is no longer running")]
    ServiceClosed,
}

impl ToastError {
    /// Short machine-readable code, used as a structured log field
    pub fn code(&self) -> &'static str {
        match self {
            ToastError::Config(_) => "CONFIG_ERROR",
            ToastError::Render(_) => "RENDER_ERROR",
            ToastError::Storage(_) => "STORAGE_ERROR",
            ToastError::Serialization(_) => "SERIALIZATION_ERROR",
            ToastError::Io(_) => "IO_ERROR",
            ToastError::Callback(_) => "CALLBACK_ERROR",
            ToastError::Destroyed => "DESTROYED",
            ToastError::ServiceClosed => "SERVICE_CLOSED",
        }
    }
}

pub type Result<T> = std::result::Result<T, ToastError>;
