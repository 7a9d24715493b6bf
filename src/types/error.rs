//! Unified Error Type System
//!
//! Centralized error types for the whole pipeline.
//!
//! ## Taxonomy
//!
//! - **BackendUnavailable**: missing credentials or configuration - the
//!   backend was never called
//! - **BackendCallFailed**: transport error, timeout, non-200 status, or a
//!   malformed response body
//! - **NoTextExtracted**: well-formed response with no usable payload
//! - **PersistenceFailed**: host rejected the description write
//!
//! Backend failures feed the fallback policy; they only surface to the
//! caller once primary and fallback are both exhausted.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AltTextError {
    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    /// Backend cannot be called at all (missing API key, unknown backend)
    #[error("backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Backend was called and the call failed
    #[error("backend '{backend}' call failed{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    BackendCallFailed {
        backend: String,
        status: Option<u16>,
        message: String,
    },

    /// Response parsed cleanly but carried no usable text
    #[error("no text extracted from '{backend}' response")]
    NoTextExtracted { backend: String },

    /// Operation exceeded its deadline
    #[error("timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Host / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("config error: {0}")]
    Config(String),

    /// Host write rejected
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// Media item missing or unreadable in the host store
    #[error("media item not found: {0}")]
    MediaNotFound(String),

    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AltTextError>;

impl AltTextError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a backend-call error without an HTTP status (transport level)
    pub fn call_failed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendCallFailed {
            backend: backend.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Create a backend-call error from a non-200 response
    pub fn http_status(
        backend: impl Into<String>,
        status: u16,
        body_preview: impl Into<String>,
    ) -> Self {
        Self::BackendCallFailed {
            backend: backend.into(),
            status: Some(status),
            message: body_preview.into(),
        }
    }

    pub fn unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Backend-level failures are eligible for the single-substitution
    /// fallback; host and config errors are not.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. }
                | Self::BackendCallFailed { .. }
                | Self::NoTextExtracted { .. }
                | Self::Timeout { .. }
                | Self::Http(_)
        )
    }

    /// Name of the backend involved, when the error carries one
    pub fn backend(&self) -> Option<&str> {
        match self {
            Self::BackendUnavailable { backend, .. }
            | Self::BackendCallFailed { backend, .. }
            | Self::NoTextExtracted { backend } => Some(backend),
            _ => None,
        }
    }
}

/// Truncate a response body for audit log fields
pub fn body_preview(body: &str) -> String {
    let cap = crate::constants::network::LOG_BODY_PREVIEW_LEN;
    if body.chars().count() <= cap {
        body.to_string()
    } else {
        body.chars().take(cap).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_failure_classification() {
        assert!(AltTextError::call_failed("gradio", "boom").is_backend_failure());
        assert!(AltTextError::unavailable("openai", "no key").is_backend_failure());
        assert!(
            AltTextError::NoTextExtracted {
                backend: "inference".into()
            }
            .is_backend_failure()
        );
        assert!(
            AltTextError::timeout("poll result", Duration::from_secs(120)).is_backend_failure()
        );
        assert!(!AltTextError::Config("bad".into()).is_backend_failure());
        assert!(!AltTextError::PersistenceFailed("locked".into()).is_backend_failure());
    }

    #[test]
    fn test_http_status_display() {
        let err = AltTextError::http_status("gradio", 503, "overloaded");
        let msg = err.to_string();
        assert!(msg.contains("503"), "{msg}");
        assert!(msg.contains("gradio"), "{msg}");
    }

    #[test]
    fn test_backend_name_extraction() {
        let err = AltTextError::call_failed("chat", "oops");
        assert_eq!(err.backend(), Some("chat"));
        assert_eq!(AltTextError::Config("x".into()).backend(), None);
    }

    #[test]
    fn test_body_preview_truncates_on_char_boundary() {
        let long = "字".repeat(600);
        let preview = body_preview(&long);
        assert_eq!(preview.chars().count(), 500);
    }
}
