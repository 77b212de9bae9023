use thiserror::Error;

/// Local failures surfaced to callers of the store, queues and services.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            AppError::DeserializationError(err.to_string())
        } else {
            AppError::SerializationError(err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Retry policy class for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Counted against the retry budget and attempted again on a later pass.
    Transient,
    /// Retrying cannot succeed; the item is dropped or failed immediately.
    Terminal,
}

/// Failures reported by the remote backend or the blob transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl RemoteError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Network(_) | Self::Timeout(_) => RetryClass::Transient,
            // A revoked key may be replaced; keep the intent until retries run out.
            Self::Unauthorized(_) => RetryClass::Transient,
            Self::Api { status, .. } => match *status {
                401 | 403 | 408 | 425 | 429 => RetryClass::Transient,
                500..=599 => RetryClass::Transient,
                _ => RetryClass::Terminal,
            },
            Self::NotFound(_) | Self::Rejected(_) => RetryClass::Terminal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.retry_class() == RetryClass::Transient
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return RemoteError::Timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            return RemoteError::api(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return RemoteError::Rejected(format!("Malformed response: {err}"));
        }
        RemoteError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(RemoteError::api(503, "down").retry_class(), RetryClass::Transient);
        assert_eq!(RemoteError::api(429, "slow down").retry_class(), RetryClass::Transient);
        assert!(RemoteError::Timeout("10s".into()).is_transient());
    }

    #[test]
    fn missing_entity_is_terminal() {
        assert_eq!(
            RemoteError::NotFound("daily chore abc".into()).retry_class(),
            RetryClass::Terminal
        );
        assert_eq!(RemoteError::api(400, "bad args").retry_class(), RetryClass::Terminal);
    }

    #[test]
    fn remote_errors_convert_into_app_errors() {
        let err: AppError = RemoteError::network("connection reset").into();
        assert!(matches!(err, AppError::Remote(RemoteError::Network(_))));
        assert_eq!(err.to_string(), "Remote error: Network error: connection reset");
    }
}
