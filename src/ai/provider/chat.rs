//! Text Refinement Backend
//!
//! Chat-completion client that turns a refinement prompt (stage-1
//! description plus entity context) into the final caption. Accepts the
//! standard `choices` envelope or the legacy `[{generated_text}]` array;
//! bodies carrying an `error` member are surfaced as backend failures even
//! when the status is 200.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{ProviderConfig, TextProvider, validate_endpoint};
use crate::ai::timeout::Timeouts;
use crate::ai::wire;
use crate::constants::refine;
use crate::types::{
    AltTextError, BackendDescriptor, BackendKind, Result, WireVariant, body_preview,
};

/// Chat-completion refinement client
pub struct ChatTextProvider {
    endpoint: String,
    model: String,
    api_key: SecretString,
    timeouts: Timeouts,
    client: reqwest::Client,
}

impl ChatTextProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| AltTextError::unavailable("chat", "API key not configured"))?;

        let endpoint = match config.endpoint {
            Some(custom) => validate_endpoint(&custom)?,
            None => refine::DEFAULT_ENDPOINT.to_string(),
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AltTextError::call_failed("chat", format!("client setup: {e}")))?;

        Ok(Self {
            endpoint,
            model: config.model,
            api_key,
            timeouts: config.timeouts,
            client,
        })
    }
}

#[async_trait]
impl TextProvider for ChatTextProvider {
    async fn refine(&self, prompt: &str) -> Result<String> {
        info!(model = %self.model, "refining caption");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            max_tokens: refine::MAX_TOKENS,
            temperature: refine::TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeouts.chat)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| AltTextError::call_failed("chat", format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AltTextError::http_status(
                "chat",
                status.as_u16(),
                body_preview(&body),
            ));
        }

        // Router APIs report model errors in-band with a 200 status
        if let Ok(value) = serde_json::from_str::<Value>(&body)
            && let Some(error) = value.get("error")
        {
            return Err(AltTextError::call_failed(
                "chat",
                format!("backend reported error: {error}"),
            ));
        }

        wire::extract_text(&body).ok_or(AltTextError::NoTextExtracted {
            backend: "chat".to_string(),
        })
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            backend: BackendKind::Chat,
            model: self.model.clone(),
            supports_custom_prompt: true,
            supports_context_injection: true,
            wire: WireVariant::DirectJson,
        }
    }
}

// Request types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::models;

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            ChatTextProvider::new(ProviderConfig::new(models::LLAMA31_8B)),
            Err(AltTextError::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: models::LLAMA31_8B.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: "Refine this.".into(),
            }],
            max_tokens: refine::MAX_TOKENS,
            temperature: refine::TEMPERATURE,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], models::LLAMA31_8B);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 100);
        assert_eq!(json["temperature"], 0.3);
    }

    #[test]
    fn test_descriptor_supports_context() {
        let provider = ChatTextProvider::new(
            ProviderConfig::new(models::LLAMA31_8B)
                .with_api_key(Some(SecretString::from("hf_test"))),
        )
        .unwrap();
        assert!(provider.descriptor().supports_context_injection);
        assert_eq!(provider.descriptor().backend, BackendKind::Chat);
    }
}
