//! Configuration Collaborator
//!
//! The host exposes persistent configuration as a simple key -> value read
//! interface. The pipeline never writes configuration; it snapshots the
//! values it needs at invocation start (see [`super::settings`]).

use std::collections::HashMap;
use std::sync::Mutex;

/// Option keys read by the pipeline
pub mod keys {
    pub const ENABLE_PIPELINE: &str = "cat_enable_pipeline";
    pub const VISION_BACKEND: &str = "cat_vision_backend";
    pub const VISION_MODEL: &str = "cat_vision_model";
    pub const VISION_PROMPT: &str = "cat_vision_prompt";
    pub const TEXT_BACKEND: &str = "cat_text_backend";
    pub const TEXT_MODEL: &str = "cat_text_model";
    pub const TEXT_PROMPT: &str = "cat_text_prompt";
    pub const PRESERVE_EXISTING: &str = "cat_preserve_existing";
    pub const LANGUAGE: &str = "cat_language";
    pub const CONTEXTUAL_AWARENESS: &str = "cat_contextual_awareness";
    pub const HUGGINGFACE_API_KEY: &str = "cat_huggingface_api_key";
    pub const OPENAI_API_KEY: &str = "cat_openai_api_key";
    pub const GRADIO_ENDPOINT: &str = "cat_gradio_endpoint";
    pub const CHAT_ENDPOINT: &str = "cat_chat_endpoint";
}

/// Read interface over the host's key/value option storage.
///
/// Implementations must be safe for concurrent use; the pipeline shares one
/// store across invocations.
pub trait ConfigStore: Send + Sync {
    /// Return the stored value for `key`, or `default` when absent.
    fn get(&self, key: &str, default: &str) -> String;

    /// Boolean convenience over `get`. Accepts "1"/"true"/"yes" as true.
    fn get_flag(&self, key: &str, default: bool) -> bool {
        let fallback = if default { "1" } else { "0" };
        matches!(
            self.get(key, fallback).to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    }
}

/// In-memory config store for tests and embedding hosts without their own
/// option storage.
#[derive(Default)]
pub struct MemoryConfig {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .expect("config mutex poisoned")
            .insert(key.into(), value.into());
    }

    /// Builder-style setter for test fixtures
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

impl ConfigStore for MemoryConfig {
    fn get(&self, key: &str, default: &str) -> String {
        self.values
            .lock()
            .expect("config mutex poisoned")
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}
