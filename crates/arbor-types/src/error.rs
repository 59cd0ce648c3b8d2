use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized `{name, message}` error payload stored in error segments
/// and handed to UI callbacks. Callers branch on `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Error taxonomy surfaced by the session engine.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// User-initiated cancellation.
    #[error("Chat stopped by user")]
    Abort,

    /// The turn deadline elapsed before the model produced a first step.
    #[error("Request timeout")]
    Timeout,

    /// `start_turn` was called with no model bound to the session.
    #[error("No model selected")]
    ModelRequired,

    /// Any other stream failure: provider HTTP errors, malformed chunks,
    /// mid-stream error events.
    #[error("{message}")]
    Stream { name: String, message: String },
}

impl ChatError {
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            name: "Error".to_string(),
            message: message.into(),
        }
    }

    /// Stable error name, mirrored into `ErrorInfo::name`.
    pub fn name(&self) -> &str {
        match self {
            Self::Abort => "AbortError",
            Self::Timeout => "TimeoutError",
            Self::ModelRequired => "ModelRequiredError",
            Self::Stream { name, .. } => name,
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo::new(self.name(), self.to_string())
    }
}

impl From<ErrorInfo> for ChatError {
    fn from(info: ErrorInfo) -> Self {
        match info.name.as_str() {
            "AbortError" => Self::Abort,
            "TimeoutError" => Self::Timeout,
            _ => Self::Stream {
                name: info.name,
                message: info.message,
            },
        }
    }
}
