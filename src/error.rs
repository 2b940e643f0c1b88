use thiserror::Error;

pub type Result<T> = std::result::Result<T, FaultgateError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FaultgateError {
    #[error("Error interceptor is already started")]
    AlreadyStarted,

    #[error("Error interceptor was never started")]
    NotStarted,

    #[error("Error interceptor is not the topmost installed handler; stop later installations first")]
    NotTopmost,

    #[error("Invalid HTTP status code: {0}")]
    InvalidStatus(u16),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),
}

impl FaultgateError {
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }
}
