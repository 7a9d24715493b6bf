//! Direct-Call Vision Backend (Inference API)
//!
//! Single-shot captioning against hosted inference endpoints: the image
//! bytes are fetched from the host and POSTed as an octet stream to the
//! model endpoint, which answers with the legacy `[{generated_text}]`
//! array. Captioning models here take no prompt; the `prompt` argument is
//! ignored.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{ProviderConfig, VisionProvider, validate_endpoint};
use crate::ai::timeout::Timeouts;
use crate::ai::wire;
use crate::constants::endpoints;
use crate::types::{
    AltTextError, BackendDescriptor, BackendKind, Result, WireVariant, body_preview,
};

/// Vision client for direct-call captioning models
pub struct InferenceVisionProvider {
    api_base: String,
    model: String,
    api_key: SecretString,
    timeouts: Timeouts,
    client: reqwest::Client,
}

impl InferenceVisionProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| AltTextError::unavailable("inference", "API key not configured"))?;

        let api_base = match config.endpoint {
            Some(custom) => validate_endpoint(&custom)?,
            None => endpoints::INFERENCE_API_BASE.to_string(),
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AltTextError::call_failed("inference", format!("client setup: {e}")))?;

        Ok(Self {
            api_base,
            model: config.model,
            api_key,
            timeouts: config.timeouts,
            client,
        })
    }

    /// Fetch the image bytes from the host before upload.
    async fn fetch_image(&self, image_url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(image_url)
            .timeout(self.timeouts.image_fetch)
            .send()
            .await
            .map_err(|e| AltTextError::call_failed("inference", format!("image fetch: {e}")))?;

        if !response.status().is_success() {
            return Err(AltTextError::http_status(
                "inference",
                response.status().as_u16(),
                format!("image fetch from {image_url}"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AltTextError::call_failed("inference", format!("image read: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl VisionProvider for InferenceVisionProvider {
    async fn describe(&self, image_url: &str, _prompt: Option<&str>) -> Result<String> {
        info!(model = %self.model, "captioning via inference API");

        let image = self.fetch_image(image_url).await?;
        debug!(bytes = image.len(), "image fetched");

        let url = format!("{}/{}", self.api_base, self.model);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeouts.submit)
            .bearer_auth(self.api_key.expose_secret())
            .header("Content-Type", "application/octet-stream")
            .body(image)
            .send()
            .await
            .map_err(|e| AltTextError::call_failed("inference", format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AltTextError::http_status(
                "inference",
                status.as_u16(),
                body_preview(&body),
            ));
        }

        wire::extract_text(&body).ok_or(AltTextError::NoTextExtracted {
            backend: "inference".to_string(),
        })
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            backend: BackendKind::Inference,
            model: self.model.clone(),
            supports_custom_prompt: false,
            supports_context_injection: false,
            wire: WireVariant::ArrayLegacy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::models;

    #[test]
    fn test_requires_api_key() {
        let err = InferenceVisionProvider::new(ProviderConfig::new(models::BLIP_BASE));
        assert!(matches!(
            err,
            Err(AltTextError::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn test_descriptor() {
        let provider = InferenceVisionProvider::new(
            ProviderConfig::new(models::BLIP_BASE)
                .with_api_key(Some(SecretString::from("hf_test"))),
        )
        .unwrap();
        let descriptor = provider.descriptor();

        assert_eq!(descriptor.backend, BackendKind::Inference);
        assert_eq!(descriptor.wire, WireVariant::ArrayLegacy);
        assert!(!descriptor.supports_custom_prompt);
    }
}
