//! Pipeline Settings Snapshot
//!
//! A typed, per-invocation snapshot of everything the pipeline reads from
//! the configuration collaborator. Taken once at invocation start so a
//! running invocation never observes a half-applied settings change.

use secrecy::SecretString;

use super::store::{ConfigStore, keys};
use crate::constants::{gradio, models, refine};
use crate::types::BackendKind;

/// Typed settings for one pipeline invocation
#[derive(Clone)]
pub struct PipelineSettings {
    pub enabled: bool,
    pub vision_backend: BackendKind,
    pub vision_model: String,
    pub text_backend: BackendKind,
    pub text_model: String,
    pub preserve_existing: bool,
    /// Target language code ("en", "zh", "ja", ...)
    pub language: String,
    pub contextual_awareness: bool,
    pub vision_prompt_override: Option<String>,
    pub text_prompt_override: Option<String>,
    pub huggingface_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
    pub gradio_endpoint: String,
    pub chat_endpoint: String,
}

impl std::fmt::Debug for PipelineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSettings")
            .field("enabled", &self.enabled)
            .field("vision_backend", &self.vision_backend)
            .field("vision_model", &self.vision_model)
            .field("text_backend", &self.text_backend)
            .field("text_model", &self.text_model)
            .field("preserve_existing", &self.preserve_existing)
            .field("language", &self.language)
            .field("contextual_awareness", &self.contextual_awareness)
            .field(
                "huggingface_api_key",
                &self.huggingface_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl PipelineSettings {
    /// Snapshot current values from the host's configuration store.
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let vision_backend = parse_backend(&store.get(keys::VISION_BACKEND, "gradio"))
            .unwrap_or(BackendKind::Gradio);
        let text_backend =
            parse_backend(&store.get(keys::TEXT_BACKEND, "chat")).unwrap_or(BackendKind::Chat);

        Self {
            enabled: store.get_flag(keys::ENABLE_PIPELINE, false),
            vision_backend,
            vision_model: store.get(keys::VISION_MODEL, default_vision_model(vision_backend)),
            text_backend,
            text_model: store.get(keys::TEXT_MODEL, models::LLAMA31_8B),
            preserve_existing: store.get_flag(keys::PRESERVE_EXISTING, false),
            language: store.get(keys::LANGUAGE, "en"),
            contextual_awareness: store.get_flag(keys::CONTEXTUAL_AWARENESS, true),
            vision_prompt_override: non_empty(store.get(keys::VISION_PROMPT, "")),
            text_prompt_override: non_empty(store.get(keys::TEXT_PROMPT, "")),
            huggingface_api_key: non_empty(store.get(keys::HUGGINGFACE_API_KEY, ""))
                .map(SecretString::from),
            openai_api_key: non_empty(store.get(keys::OPENAI_API_KEY, ""))
                .map(SecretString::from),
            gradio_endpoint: store.get(keys::GRADIO_ENDPOINT, gradio::DEFAULT_ENDPOINT),
            chat_endpoint: store.get(keys::CHAT_ENDPOINT, refine::DEFAULT_ENDPOINT),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_backend(value: &str) -> Option<BackendKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gradio" => Some(BackendKind::Gradio),
        "inference" | "huggingface" => Some(BackendKind::Inference),
        "openai" => Some(BackendKind::OpenAi),
        "chat" => Some(BackendKind::Chat),
        _ => None,
    }
}

/// Model used when the store names a backend but no model
pub fn default_vision_model(backend: BackendKind) -> &'static str {
    match backend {
        BackendKind::Gradio => models::JOY_CAPTION,
        BackendKind::Inference => models::BLIP_BASE,
        BackendKind::OpenAi => models::GPT4O,
        BackendKind::Chat => models::LLAMA31_8B,
    }
}
