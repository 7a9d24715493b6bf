//! Chat-Completion Vision Backend
//!
//! Direct-call vision variant against OpenAI-compatible chat APIs: one POST
//! carrying the prompt and the image URL as content parts, response in the
//! standard `choices[0].message.content` envelope.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::info;

use super::{ProviderConfig, VisionProvider, validate_endpoint};
use crate::ai::timeout::Timeouts;
use crate::ai::wire;
use crate::constants::{endpoints, refine};
use crate::types::{
    AltTextError, BackendDescriptor, BackendKind, Result, WireVariant, body_preview,
};

/// Vision client for OpenAI-compatible chat-completion APIs
pub struct OpenAiVisionProvider {
    api_base: String,
    model: String,
    api_key: SecretString,
    timeouts: Timeouts,
    client: reqwest::Client,
}

impl OpenAiVisionProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| AltTextError::unavailable("openai", "API key not configured"))?;

        let api_base = match config.endpoint {
            Some(custom) => validate_endpoint(&custom)?,
            None => endpoints::OPENAI_API_BASE.to_string(),
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AltTextError::call_failed("openai", format!("client setup: {e}")))?;

        Ok(Self {
            api_base,
            model: config.model,
            api_key,
            timeouts: config.timeouts,
            client,
        })
    }

    fn build_request(&self, image_url: &str, prompt: &str) -> VisionChatRequest {
        VisionChatRequest {
            model: self.model.clone(),
            messages: vec![VisionMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                        },
                    },
                ],
            }],
            max_tokens: refine::MAX_TOKENS,
            temperature: refine::TEMPERATURE,
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAiVisionProvider {
    async fn describe(&self, image_url: &str, prompt: Option<&str>) -> Result<String> {
        let prompt = prompt.unwrap_or(crate::ai::prompt::DEFAULT_VISION_PROMPT);
        info!(model = %self.model, "describing image via chat completion");

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeouts.submit)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.build_request(image_url, prompt))
            .send()
            .await
            .map_err(|e| AltTextError::call_failed("openai", format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AltTextError::http_status(
                "openai",
                status.as_u16(),
                body_preview(&body),
            ));
        }

        wire::extract_text(&body).ok_or(AltTextError::NoTextExtracted {
            backend: "openai".to_string(),
        })
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            backend: BackendKind::OpenAi,
            model: self.model.clone(),
            supports_custom_prompt: true,
            supports_context_injection: false,
            wire: WireVariant::DirectJson,
        }
    }
}

// Request types

#[derive(Debug, Serialize)]
struct VisionChatRequest {
    model: String,
    messages: Vec<VisionMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct VisionMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}
