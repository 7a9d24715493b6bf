//! Polling Vision Backend (Gradio Protocol)
//!
//! Two-phase wire protocol against a hosted caption space:
//!
//! 1. POST the job to the "call" endpoint with ordered positional
//!    parameters; the response carries an `event_id`
//! 2. GET the "result" endpoint keyed by that id; the body is either plain
//!    JSON `{data: [text, ...]}` or an SSE stream whose last frame holds
//!    the complete caption
//!
//! The poll phase gets a materially longer deadline than the submit phase -
//! inference latency dominates. A non-200 status or transport error at
//! either phase is a backend failure feeding the fallback policy.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ProviderConfig, VisionProvider, validate_endpoint};
use crate::ai::timeout::{Timeouts, with_timeout};
use crate::ai::wire;
use crate::constants::gradio;
use crate::types::{
    AltTextError, BackendDescriptor, BackendKind, Result, WireVariant, body_preview,
};

/// Vision client speaking the submit-then-poll Gradio protocol
pub struct GradioVisionProvider {
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    timeouts: Timeouts,
    client: reqwest::Client,
}

impl GradioVisionProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let endpoint = match config.endpoint {
            Some(custom) => validate_endpoint(&custom)?,
            None => gradio::DEFAULT_ENDPOINT.to_string(),
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AltTextError::call_failed("gradio", format!("client setup: {e}")))?;

        Ok(Self {
            endpoint,
            model: config.model,
            api_key: config.api_key,
            timeouts: config.timeouts,
            client,
        })
    }

    /// Phase one: submit the job, extract the event identifier.
    async fn submit(&self, image_url: &str, prompt: &str) -> Result<String> {
        let payload = GradioCallRequest {
            data: (
                FileData {
                    path: image_url.to_string(),
                    meta: FileMeta {
                        kind: "gradio.FileData",
                    },
                },
                prompt.to_string(),
                gradio::TEMPERATURE,
                gradio::TOP_P,
                gradio::MAX_NEW_TOKENS,
                true, // log_prompt
            ),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeouts.submit)
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AltTextError::call_failed("gradio", format!("submit failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AltTextError::http_status(
                "gradio",
                status.as_u16(),
                body_preview(&body),
            ));
        }

        let parsed: GradioCallResponse = serde_json::from_str(&body).map_err(|e| {
            AltTextError::call_failed("gradio", format!("unparseable submit response: {e}"))
        })?;

        parsed.event_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            AltTextError::call_failed("gradio", "submit response carried no event_id")
        })
    }

    /// Phase two: fetch the result keyed by the event identifier.
    async fn poll_result(&self, event_id: &str) -> Result<String> {
        let url = format!("{}/{event_id}", self.endpoint);

        let mut request = self.client.get(&url).timeout(self.timeouts.poll);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AltTextError::call_failed("gradio", format!("poll failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AltTextError::http_status(
                "gradio",
                status.as_u16(),
                body_preview(&body),
            ));
        }

        debug!(body_len = body.len(), "gradio result body received");

        wire::extract_text(&body).ok_or(AltTextError::NoTextExtracted {
            backend: "gradio".to_string(),
        })
    }
}

#[async_trait]
impl VisionProvider for GradioVisionProvider {
    async fn describe(&self, image_url: &str, prompt: Option<&str>) -> Result<String> {
        let prompt = prompt.unwrap_or(crate::ai::prompt::DEFAULT_VISION_PROMPT);

        // Overall deadline across both phases; each phase also carries its
        // own per-request timeout.
        let deadline = self.timeouts.submit + self.timeouts.poll;
        with_timeout(
            deadline,
            async {
                info!(model = %self.model, "submitting caption job");
                let event_id = self.submit(image_url, prompt).await?;

                debug!(%event_id, "polling caption result");
                self.poll_result(&event_id).await
            },
            "gradio describe",
        )
        .await
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            backend: BackendKind::Gradio,
            model: self.model.clone(),
            supports_custom_prompt: true,
            supports_context_injection: false,
            wire: WireVariant::Polling,
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct GradioCallRequest {
    /// Ordered positional parameters: image, prompt, temperature, top_p,
    /// max_new_tokens, log_prompt
    data: (FileData, String, f64, f64, u32, bool),
}

#[derive(Debug, Serialize)]
struct FileData {
    path: String,
    meta: FileMeta,
}

#[derive(Debug, Serialize)]
struct FileMeta {
    #[serde(rename = "_type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct GradioCallResponse {
    event_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_request_serializes_positionally() {
        let payload = GradioCallRequest {
            data: (
                FileData {
                    path: "https://example.com/a.jpg".into(),
                    meta: FileMeta {
                        kind: "gradio.FileData",
                    },
                },
                "Describe this.".into(),
                0.6,
                0.9,
                256,
                true,
            ),
        };
        let json = serde_json::to_value(&payload).unwrap();
        let data = json["data"].as_array().unwrap();

        assert_eq!(data.len(), 6);
        assert_eq!(data[0]["path"], "https://example.com/a.jpg");
        assert_eq!(data[0]["meta"]["_type"], "gradio.FileData");
        assert_eq!(data[1], "Describe this.");
        assert_eq!(data[2], 0.6);
        assert_eq!(data[3], 0.9);
        assert_eq!(data[4], 256);
        assert_eq!(data[5], true);
    }

    #[test]
    fn test_call_response_event_id_optional() {
        let with: GradioCallResponse = serde_json::from_str(r#"{"event_id": "abc123"}"#).unwrap();
        assert_eq!(with.event_id.as_deref(), Some("abc123"));

        let without: GradioCallResponse = serde_json::from_str(r#"{"detail": "queued"}"#).unwrap();
        assert!(without.event_id.is_none());
    }

    #[test]
    fn test_descriptor() {
        let provider =
            GradioVisionProvider::new(ProviderConfig::new(crate::constants::models::JOY_CAPTION))
                .unwrap();
        let descriptor = provider.descriptor();
        assert_eq!(descriptor.backend, BackendKind::Gradio);
        assert_eq!(descriptor.wire, WireVariant::Polling);
        assert!(descriptor.supports_custom_prompt);
    }

    #[test]
    fn test_custom_endpoint_validated() {
        let bad = ProviderConfig::new("m").with_endpoint("file:///etc/passwd");
        assert!(GradioVisionProvider::new(bad).is_err());
    }
}
