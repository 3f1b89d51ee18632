//! Error types shared across the Skywall agent

/// Result type alias for Skywall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the agent runtime
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Environment error: {message}")]
    Environment { message: String },

    #[error("Status error: {message}")]
    Status { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Generic(message)
    }
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an environment error
    pub fn environment<S: Into<String>>(message: S) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }

    /// Create a status error
    pub fn status<S: Into<String>>(message: S) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}
