//! Backend Provider Abstraction
//!
//! Capability contracts over interchangeable vision and text backends. Each
//! client module speaks one wire protocol:
//!
//! - `gradio`: submit-then-poll with SSE result delivery (vision)
//! - `inference`: direct octet-stream POST, legacy array response (vision)
//! - `openai`: chat-completion with image URL content (vision)
//! - `chat`: chat-completion text refinement
//!
//! Providers return the extracted raw text; sanitization and length limits
//! are applied later by the pipeline.

mod chat;
mod gradio;
mod inference;
mod openai;

pub use chat::ChatTextProvider;
pub use gradio::GradioVisionProvider;
pub use inference::InferenceVisionProvider;
pub use openai::OpenAiVisionProvider;

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;

use crate::ai::timeout::Timeouts;
use crate::types::{AltTextError, BackendDescriptor, BackendKind, Result};

/// Vision backend contract: turn an image URL into a textual description.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Describe the image, optionally with an explicit prompt. Backends
    /// without custom-prompt support ignore `prompt`.
    async fn describe(&self, image_url: &str, prompt: Option<&str>) -> Result<String>;

    fn descriptor(&self) -> BackendDescriptor;
}

/// Text backend contract: turn a refinement prompt into the final caption.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn refine(&self, prompt: &str) -> Result<String>;

    fn descriptor(&self) -> BackendDescriptor;
}

/// Shared provider handles for concurrent pipeline invocations
pub type SharedVisionProvider = Arc<dyn VisionProvider>;
pub type SharedTextProvider = Arc<dyn TextProvider>;

/// Configuration for constructing one backend client
#[derive(Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub api_key: Option<SecretString>,
    /// Custom endpoint; each client falls back to its well-known default
    pub endpoint: Option<String>,
    pub timeouts: Timeouts,
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            endpoint: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_api_key(mut self, key: Option<SecretString>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Create a vision provider for the given backend family.
pub fn create_vision_provider(
    kind: BackendKind,
    config: ProviderConfig,
) -> Result<SharedVisionProvider> {
    match kind {
        BackendKind::Gradio => Ok(Arc::new(GradioVisionProvider::new(config)?)),
        BackendKind::Inference => Ok(Arc::new(InferenceVisionProvider::new(config)?)),
        BackendKind::OpenAi => Ok(Arc::new(OpenAiVisionProvider::new(config)?)),
        BackendKind::Chat => Err(AltTextError::Config(format!(
            "'{kind}' is a text backend, not a vision backend"
        ))),
    }
}

/// Create a text refinement provider for the given backend family.
pub fn create_text_provider(
    kind: BackendKind,
    config: ProviderConfig,
) -> Result<SharedTextProvider> {
    match kind {
        BackendKind::Chat => Ok(Arc::new(ChatTextProvider::new(config)?)),
        other => Err(AltTextError::Config(format!(
            "'{other}' is not a text refinement backend"
        ))),
    }
}

/// Validate a custom endpoint URL: http/https only.
pub(crate) fn validate_endpoint(endpoint: &str) -> Result<String> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| AltTextError::Config(format!("invalid endpoint URL '{endpoint}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AltTextError::Config(format!(
            "endpoint must use http or https, got: {}",
            url.scheme()
        )));
    }

    let mut result = url.to_string();
    if result.ends_with('/') {
        result.pop();
    }
    Ok(result)
}
