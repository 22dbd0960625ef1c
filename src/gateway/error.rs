use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of failure kinds surfaced to the session store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    Timeout,
    Network,
    InvalidResponseFormat,
    UnhealthyBackend,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Timeout => "timeout",
            ErrorCode::Network => "network",
            ErrorCode::InvalidResponseFormat => "invalid-response-format",
            ErrorCode::UnhealthyBackend => "unhealthy-backend",
            ErrorCode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct ChatError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ChatError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "Request timed out. Please try again.")
    }

    pub fn unhealthy() -> Self {
        Self::new(ErrorCode::UnhealthyBackend, "API is not responding")
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn invalid_format(raw: Value) -> Self {
        Self::new(
            ErrorCode::InvalidResponseFormat,
            "No valid answer found in backend response",
        )
        .with_details(raw)
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::timeout().with_details(Value::String(err.to_string()))
        } else if err.is_builder() {
            ChatError::new(ErrorCode::Unknown, "An unexpected error occurred")
                .with_details(Value::String(err.to_string()))
        } else {
            ChatError::network("Failed to send message").with_details(Value::String(err.to_string()))
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
