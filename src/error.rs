//! Error types for the summarization pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that end a pipeline invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Input rejected before any sectioning happened.
    #[error("invalid input: {reason}")]
    Validation { reason: String },

    /// The final synthesis call failed, so no summary can be produced.
    #[error("aggregation failed: {source}")]
    Aggregation {
        #[source]
        source: SummarizerError,
    },

    /// The caller cancelled the run.
    #[error("summarization cancelled")]
    Cancelled,

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal failure (task panicked, gate closed).
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl PipelineError {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Stable category for terminal error events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Aggregation { .. } => ErrorKind::Aggregation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) | Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Category carried by a terminal `Error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Aggregation,
    Cancelled,
    Internal,
}

/// Failure of a single call to the external summarizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SummarizerError {
    /// The request could not be sent or the connection dropped.
    #[error("request failed: {0}")]
    Request(String),

    /// The call did not finish in time.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The reply could not be turned into a summary.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SummarizerError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) | Self::InvalidResponse(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Invalid or missing configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PipelineError::validation("empty").kind(),
            ErrorKind::Validation
        );
        assert_eq!(PipelineError::Cancelled.kind(), ErrorKind::Cancelled);
        let agg = PipelineError::Aggregation {
            source: SummarizerError::Timeout(30),
        };
        assert_eq!(agg.kind(), ErrorKind::Aggregation);
        assert_eq!(agg.to_string(), "aggregation failed: request timed out after 30s");
    }

    #[test]
    fn test_retryable_statuses() {
        let rate_limited = SummarizerError::Api {
            status: 429,
            body: String::new(),
        };
        let server = SummarizerError::Api {
            status: 503,
            body: String::new(),
        };
        let bad_request = SummarizerError::Api {
            status: 400,
            body: String::new(),
        };
        assert!(rate_limited.is_retryable());
        assert!(server.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(SummarizerError::Timeout(5).is_retryable());
    }
}
