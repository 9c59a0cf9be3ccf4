use thiserror::Error;

// ======================================================
// ERROR TAXONOMY
// ======================================================

/// Every failure a wizard step can surface.
///
/// The first four variants are the user-facing kinds. The rest is plumbing
/// that still has to be reported at a step boundary.
#[derive(Error, Debug)]
pub enum InsightsError {
    /// Missing or malformed local input. Caught before any network call.
    #[error("{0}")]
    Validation(String),

    /// The request never completed (timeout, refused connection, DNS).
    #[error("Network error: {0}")]
    Network(String),

    /// The request completed but the backend answered with a failure status.
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// Document assembly or rendering failed after the data was available.
    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("No {kind} with id '{id}'")]
    NotFound { kind: &'static str, id: String },

    /// An action of the same session is still in flight.
    #[error("Another request is still in progress")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Api,
    Render,
    Internal,
}

impl InsightsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        InsightsError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InsightsError::Validation(_) | InsightsError::NotFound { .. } => ErrorKind::Validation,
            InsightsError::Network(_) => ErrorKind::Network,
            InsightsError::Api { .. } => ErrorKind::Api,
            InsightsError::Render(_) => ErrorKind::Render,
            InsightsError::Busy
            | InsightsError::Config(_)
            | InsightsError::Io(_)
            | InsightsError::Json(_) => ErrorKind::Internal,
        }
    }

    /// Network and API failures can be fixed by submitting the same step again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Api | ErrorKind::Render)
    }

    /// Message shown inline at the failing step.
    ///
    /// Backend `detail` strings are passed through verbatim; an empty detail
    /// falls back to a generic sentence.
    pub fn user_message(&self) -> String {
        match self {
            InsightsError::Validation(msg) => msg.clone(),
            InsightsError::Network(_) => {
                "Could not reach the report service. Check your connection and try again.".to_string()
            }
            InsightsError::Api { detail, .. } if !detail.trim().is_empty() => detail.clone(),
            InsightsError::Api { status, .. } => {
                format!("The report service rejected the request (HTTP {}).", status)
            }
            InsightsError::Render(msg) => format!("The report could not be generated: {}", msg),
            other => other.to_string(),
        }
    }
}
