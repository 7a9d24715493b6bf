//! Timeout Handling
//!
//! Every backend call is a blocking network operation with an explicit
//! deadline: short for direct calls and job submission, long for
//! polling-result retrieval where model inference latency dominates. A call
//! exceeding its deadline is a backend failure, identical to a non-200
//! response, and feeds the fallback policy.

use std::future::Future;
use std::time::Duration;

use crate::constants::network;
use crate::types::{AltTextError, Result};

/// Per-operation timeout configuration
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Direct backend calls and polling job submission
    pub submit: Duration,
    /// Polling-result retrieval
    pub poll: Duration,
    /// Chat-completion calls (vision and refinement)
    pub chat: Duration,
    /// Fetching image bytes for octet-stream uploads
    pub image_fetch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            submit: Duration::from_secs(network::SUBMIT_TIMEOUT_SECS),
            poll: Duration::from_secs(network::POLL_TIMEOUT_SECS),
            chat: Duration::from_secs(network::CHAT_TIMEOUT_SECS),
            image_fetch: Duration::from_secs(network::IMAGE_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Execute an async operation with a deadline.
///
/// Expiry maps to `AltTextError::Timeout` carrying the operation name for
/// the audit log.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(AltTextError::timeout(operation, timeout)),
    }
}
