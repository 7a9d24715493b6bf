//! Pipeline Orchestrator
//!
//! Drives the two-stage generate-then-refine flow end to end: precondition
//! checks, vision description with bounded fallback, contextual refinement
//! (soft - never a hard dependency), sanitization, and the guarded
//! description write. Every step emits one audit record correlated by media
//! item id.
//!
//! `run` never returns an error; outcomes (`success` / `skipped` /
//! `failed`) and the failing stage are encoded in [`PipelineResult`].

pub mod fallback;

pub use fallback::{FallbackPlan, FallbackPolicy};

use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::ai::provider::{
    ProviderConfig, SharedTextProvider, SharedVisionProvider, create_text_provider,
    create_vision_provider,
};
use crate::ai::{prompt, sanitize};
use crate::config::settings::default_vision_model;
use crate::config::{ConfigStore, PipelineSettings};
use crate::host::{AuditLog, LogLevel, MediaStore};
use crate::types::{
    AltTextError, BackendKind, EntityContext, GenerationAttempt, MediaItem, PipelineRequest,
    PipelineResult, Result, SkipReason, Stage,
};

/// Constructs backend clients per invocation. A seam so tests can substitute
/// scripted providers for the HTTP clients.
pub trait ProviderFactory: Send + Sync {
    fn vision(&self, kind: BackendKind, config: ProviderConfig) -> Result<SharedVisionProvider>;
    fn text(&self, kind: BackendKind, config: ProviderConfig) -> Result<SharedTextProvider>;
}

/// Production factory building the real HTTP clients
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn vision(&self, kind: BackendKind, config: ProviderConfig) -> Result<SharedVisionProvider> {
        create_vision_provider(kind, config)
    }

    fn text(&self, kind: BackendKind, config: ProviderConfig) -> Result<SharedTextProvider> {
        create_text_provider(kind, config)
    }
}

/// The orchestrator. Collaborators are injected; one instance serves many
/// concurrent invocations.
pub struct Pipeline {
    config: Arc<dyn ConfigStore>,
    media: Arc<dyn MediaStore>,
    audit: Arc<dyn AuditLog>,
    factory: Arc<dyn ProviderFactory>,
    policy: FallbackPolicy,
}

impl Pipeline {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        media: Arc<dyn MediaStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            config,
            media,
            audit,
            factory: Arc::new(HttpProviderFactory),
            policy: FallbackPolicy::new(),
        }
    }

    /// Substitute the provider factory (test doubles, alternative clients)
    pub fn with_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Run one caption-generation invocation.
    #[instrument(skip(self), fields(media_id = request.media_id))]
    pub async fn run(&self, request: PipelineRequest) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let media_id = request.media_id;

        // Settings are snapshotted once; a running invocation never sees a
        // half-applied configuration change.
        let settings = PipelineSettings::from_store(self.config.as_ref());
        debug!(?settings, "settings snapshot taken");

        // -- Preconditions ----------------------------------------------------
        if !settings.enabled {
            self.log(
                LogLevel::Warning,
                "pipeline disabled, skipping",
                json!({"run_id": run_id}),
                media_id,
            );
            return PipelineResult::skipped(run_id, SkipReason::PipelineDisabled);
        }

        let item = match self.media.get_by_id(media_id).await {
            Ok(item) => item,
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    "could not load media item",
                    json!({"run_id": run_id, "error": e.to_string()}),
                    media_id,
                );
                return PipelineResult::failed(run_id, Stage::Describe);
            }
        };

        if !item.is_image() {
            self.log(
                LogLevel::Info,
                "media item is not an image, skipping",
                json!({"run_id": run_id, "mime_type": item.mime_type}),
                media_id,
            );
            return PipelineResult::skipped(run_id, SkipReason::NotAnImage);
        }

        if item.has_description() && settings.preserve_existing && !request.force_overwrite {
            self.log(
                LogLevel::Info,
                "existing description preserved, skipping",
                json!({"run_id": run_id}),
                media_id,
            );
            return PipelineResult::skipped(run_id, SkipReason::DescriptionPreserved);
        }

        let description_absent_at_start = !item.has_description();

        // -- Stage 1: describe ------------------------------------------------
        let Some(description) = self.describe(&request, &settings, &item, run_id).await else {
            return PipelineResult::failed(run_id, Stage::Describe);
        };

        // -- Stage 2: refine (soft) -------------------------------------------
        let refined = self
            .refine(&settings, &item, &description, run_id)
            .await
            .unwrap_or(description);

        // -- Post-process -----------------------------------------------------
        let caption = sanitize::limit_length(&sanitize::clean(&refined), &settings.language);
        if caption.is_empty() {
            self.log(
                LogLevel::Error,
                "caption empty after sanitization",
                json!({"run_id": run_id}),
                media_id,
            );
            return PipelineResult::failed(run_id, Stage::Describe);
        }

        // -- Persist ----------------------------------------------------------
        // Re-check immediately before writing: if a concurrent invocation
        // wrote in the meantime, do not write twice. Best effort only;
        // strict exclusivity needs an external lock keyed by media id.
        if description_absent_at_start && !request.force_overwrite {
            match self.media.existing_description(media_id).await {
                Ok(Some(_)) => {
                    self.log(
                        LogLevel::Warning,
                        "description appeared concurrently, skipping write",
                        json!({"run_id": run_id}),
                        media_id,
                    );
                    return PipelineResult::skipped(run_id, SkipReason::DescriptionPreserved);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "pre-write re-check failed, writing anyway");
                }
            }
        }

        if let Err(e) = self.media.set_description(media_id, &caption).await {
            self.log(
                LogLevel::Error,
                "description write rejected by host",
                json!({"run_id": run_id, "error": e.to_string()}),
                media_id,
            );
            return PipelineResult::failed(run_id, Stage::Persist);
        }

        self.log(
            LogLevel::Success,
            "caption saved",
            json!({"run_id": run_id, "caption": caption, "language": settings.language}),
            media_id,
        );
        PipelineResult::success(run_id, caption)
    }

    /// Stage 1: vision description with the single-substitution fallback.
    /// Returns `None` once primary and fallback are both exhausted.
    async fn describe(
        &self,
        request: &PipelineRequest,
        settings: &PipelineSettings,
        item: &MediaItem,
        run_id: Uuid,
    ) -> Option<String> {
        let kind = request.backend_override.unwrap_or(settings.vision_backend);
        let model = if kind == settings.vision_backend {
            settings.vision_model.clone()
        } else {
            default_vision_model(kind).to_string()
        };

        let base_prompt = request
            .prompt_override
            .as_deref()
            .or(settings.vision_prompt_override.as_deref());
        let vision_prompt = prompt::vision_prompt(base_prompt, &settings.language);

        match self
            .attempt_describe(kind, &model, settings, item, &vision_prompt, run_id)
            .await
        {
            Ok(text) => Some(text),
            Err(primary_err) => {
                let failed = descriptor_for(kind, &model);
                self.log(
                    LogLevel::Error,
                    "vision backend failed",
                    json!({
                        "run_id": run_id,
                        "backend": kind.as_str(),
                        "model": model,
                        "error": primary_err.to_string(),
                    }),
                    item.id,
                );

                let plan = self.policy.vision_fallback(&failed)?;
                self.log(
                    LogLevel::Info,
                    "trying designated fallback backend",
                    json!({
                        "run_id": run_id,
                        "backend": plan.kind.as_str(),
                        "model": plan.model,
                    }),
                    item.id,
                );

                match self
                    .attempt_describe(plan.kind, &plan.model, settings, item, &vision_prompt, run_id)
                    .await
                {
                    Ok(text) => {
                        self.log(
                            LogLevel::Success,
                            "describe stage recovered via fallback",
                            json!({
                                "run_id": run_id,
                                "backend": plan.kind.as_str(),
                                "model": plan.model,
                            }),
                            item.id,
                        );
                        Some(text)
                    }
                    Err(fallback_err) => {
                        self.log(
                            LogLevel::Error,
                            "fallback vision backend failed, describe stage exhausted",
                            json!({
                                "run_id": run_id,
                                "backend": plan.kind.as_str(),
                                "model": plan.model,
                                "error": fallback_err.to_string(),
                            }),
                            item.id,
                        );
                        None
                    }
                }
            }
        }
    }

    /// One vision attempt against one backend.
    async fn attempt_describe(
        &self,
        kind: BackendKind,
        model: &str,
        settings: &PipelineSettings,
        item: &MediaItem,
        vision_prompt: &str,
        run_id: Uuid,
    ) -> Result<String> {
        let provider = self.factory.vision(kind, self.provider_config(kind, model, settings))?;

        let started = Instant::now();
        let text = provider.describe(&item.url, Some(vision_prompt)).await?;

        if text.trim().is_empty() {
            return Err(AltTextError::NoTextExtracted {
                backend: kind.as_str().to_string(),
            });
        }

        let attempt = GenerationAttempt {
            descriptor: provider.descriptor(),
            elapsed: started.elapsed(),
            text: Some(text),
        };
        self.log(
            LogLevel::Info,
            "image description generated",
            json!({
                "run_id": run_id,
                "backend": attempt.descriptor.backend.as_str(),
                "model": attempt.descriptor.model,
                "elapsed_ms": attempt.elapsed.as_millis() as u64,
                "chars": attempt.chars(),
            }),
            item.id,
        );
        Ok(attempt.text.unwrap_or_default())
    }

    /// Stage 2: contextual refinement. Returns `None` whenever the stage-1
    /// description should be kept - refinement is an enhancement, never a
    /// hard dependency.
    async fn refine(
        &self,
        settings: &PipelineSettings,
        item: &MediaItem,
        description: &str,
        run_id: Uuid,
    ) -> Option<String> {
        if !settings.contextual_awareness {
            self.log(
                LogLevel::Info,
                "contextual awareness disabled, keeping image description",
                json!({"run_id": run_id}),
                item.id,
            );
            return None;
        }

        let context = match self.media.owning_entity_context(item.id).await {
            Ok(ctx) => ctx.filter(|c| !c.is_empty()),
            Err(e) => {
                warn!(error = %e, "context lookup failed");
                None
            }
        };
        let Some(context) = context else {
            self.log(
                LogLevel::Info,
                "no entity context available, keeping image description",
                json!({"run_id": run_id}),
                item.id,
            );
            return None;
        };
        self.log_context(&context, run_id, item.id);

        let provider = match self.factory.text(
            settings.text_backend,
            self.provider_config(settings.text_backend, &settings.text_model, settings),
        ) {
            Ok(provider) => provider,
            Err(e) => {
                self.log(
                    LogLevel::Warning,
                    "refinement backend unavailable, keeping image description",
                    json!({"run_id": run_id, "error": e.to_string()}),
                    item.id,
                );
                return None;
            }
        };

        let refine_prompt = prompt::refine_prompt(
            description,
            Some(&context),
            settings.text_prompt_override.as_deref(),
            &settings.language,
        );

        match provider.refine(&refine_prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                self.log(
                    LogLevel::Success,
                    "contextual caption generated",
                    json!({
                        "run_id": run_id,
                        "backend": settings.text_backend.as_str(),
                        "model": settings.text_model,
                        "chars": text.chars().count(),
                    }),
                    item.id,
                );
                Some(text)
            }
            Ok(_) => {
                self.log(
                    LogLevel::Warning,
                    "refinement returned empty text, keeping image description",
                    json!({"run_id": run_id}),
                    item.id,
                );
                None
            }
            Err(e) => {
                self.log(
                    LogLevel::Warning,
                    "refinement failed, keeping image description",
                    json!({
                        "run_id": run_id,
                        "backend": settings.text_backend.as_str(),
                        "model": settings.text_model,
                        "error": e.to_string(),
                    }),
                    item.id,
                );
                None
            }
        }
    }

    fn provider_config(
        &self,
        kind: BackendKind,
        model: &str,
        settings: &PipelineSettings,
    ) -> ProviderConfig {
        let mut config = ProviderConfig::new(model);
        config = match kind {
            BackendKind::Gradio => config
                .with_api_key(settings.huggingface_api_key.clone())
                .with_endpoint(settings.gradio_endpoint.clone()),
            BackendKind::Inference => config.with_api_key(settings.huggingface_api_key.clone()),
            BackendKind::OpenAi => config.with_api_key(settings.openai_api_key.clone()),
            BackendKind::Chat => config
                .with_api_key(settings.huggingface_api_key.clone())
                .with_endpoint(settings.chat_endpoint.clone()),
        };
        config
    }

    fn log_context(&self, context: &EntityContext, run_id: Uuid, media_id: u64) {
        self.log(
            LogLevel::Debug,
            "entity context collected",
            json!({
                "run_id": run_id,
                "title": context.title,
                "excerpt_chars": context.excerpt.chars().count(),
                "categories": context.categories,
                "tags": context.tags,
                "entity_type": context.entity_type,
            }),
            media_id,
        );
    }

    fn log(&self, level: LogLevel, message: &str, fields: serde_json::Value, media_id: u64) {
        self.audit.write(level, message, fields, Some(media_id));
    }
}

fn descriptor_for(kind: BackendKind, model: &str) -> crate::types::BackendDescriptor {
    use crate::types::WireVariant;
    crate::types::BackendDescriptor {
        backend: kind,
        model: model.to_string(),
        supports_custom_prompt: !matches!(kind, BackendKind::Inference),
        supports_context_injection: matches!(kind, BackendKind::Chat),
        wire: match kind {
            BackendKind::Gradio => WireVariant::Polling,
            BackendKind::Inference => WireVariant::ArrayLegacy,
            BackendKind::OpenAi | BackendKind::Chat => WireVariant::DirectJson,
        },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{TextProvider, VisionProvider};
    use crate::config::{MemoryConfig, keys};
    use crate::host::{MemoryAuditLog, MemoryMediaStore};
    use crate::types::{BackendDescriptor, MediaId, Outcome};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Queued backend responses shared between a factory and the providers
    /// it hands out. Calls consume the queue front to back.
    #[derive(Default)]
    struct Script {
        vision: Mutex<VecDeque<Result<String>>>,
        vision_calls: AtomicUsize,
        text: Mutex<VecDeque<Result<String>>>,
        text_calls: AtomicUsize,
    }

    struct ScriptedFactory {
        script: Arc<Script>,
        text_unavailable: bool,
    }

    impl ScriptedFactory {
        fn new() -> (Arc<Self>, Arc<Script>) {
            let script = Arc::new(Script::default());
            let factory = Arc::new(Self {
                script: script.clone(),
                text_unavailable: false,
            });
            (factory, script)
        }

        fn without_text_backend() -> (Arc<Self>, Arc<Script>) {
            let script = Arc::new(Script::default());
            let factory = Arc::new(Self {
                script: script.clone(),
                text_unavailable: true,
            });
            (factory, script)
        }
    }

    impl ProviderFactory for ScriptedFactory {
        fn vision(&self, kind: BackendKind, config: ProviderConfig) -> Result<SharedVisionProvider> {
            Ok(Arc::new(ScriptedVision {
                script: self.script.clone(),
                kind,
                model: config.model,
            }))
        }

        fn text(&self, _kind: BackendKind, config: ProviderConfig) -> Result<SharedTextProvider> {
            if self.text_unavailable {
                return Err(AltTextError::unavailable("chat", "API key not configured"));
            }
            Ok(Arc::new(ScriptedText {
                script: self.script.clone(),
                model: config.model,
            }))
        }
    }

    struct ScriptedVision {
        script: Arc<Script>,
        kind: BackendKind,
        model: String,
    }

    #[async_trait]
    impl VisionProvider for ScriptedVision {
        async fn describe(&self, _image_url: &str, _prompt: Option<&str>) -> Result<String> {
            self.script.vision_calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .vision
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(AltTextError::unavailable(
                        self.kind.as_str(),
                        "script exhausted",
                    ))
                })
        }

        fn descriptor(&self) -> BackendDescriptor {
            descriptor_for(self.kind, &self.model)
        }
    }

    struct ScriptedText {
        script: Arc<Script>,
        model: String,
    }

    #[async_trait]
    impl TextProvider for ScriptedText {
        async fn refine(&self, _prompt: &str) -> Result<String> {
            self.script.text_calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .text
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AltTextError::unavailable("chat", "script exhausted")))
        }

        fn descriptor(&self) -> BackendDescriptor {
            descriptor_for(BackendKind::Chat, &self.model)
        }
    }

    // Fixture helpers

    fn image(id: MediaId) -> MediaItem {
        MediaItem {
            id,
            url: format!("https://example.com/{id}.jpg"),
            mime_type: "image/jpeg".into(),
            existing_description: None,
            parent_entity: Some(100),
        }
    }

    fn enabled_config() -> MemoryConfig {
        MemoryConfig::new().with(keys::ENABLE_PIPELINE, "1")
    }

    struct Harness {
        pipeline: Pipeline,
        media: Arc<MemoryMediaStore>,
        audit: Arc<MemoryAuditLog>,
        script: Arc<Script>,
    }

    fn harness(config: MemoryConfig, factory: Arc<ScriptedFactory>, script: Arc<Script>) -> Harness {
        let media = Arc::new(MemoryMediaStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let pipeline =
            Pipeline::new(Arc::new(config), media.clone(), audit.clone()).with_factory(factory);
        Harness {
            pipeline,
            media,
            audit,
            script,
        }
    }

    fn push_vision(script: &Script, result: Result<String>) {
        script.vision.lock().unwrap().push_back(result);
    }

    fn push_text(script: &Script, result: Result<String>) {
        script.text.lock().unwrap().push_back(result);
    }

    #[tokio::test]
    async fn test_disabled_pipeline_skips_without_backend_calls() {
        let (factory, script) = ScriptedFactory::new();
        let h = harness(MemoryConfig::new(), factory, script);
        h.media.insert(image(1));

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Skipped);
        assert_eq!(result.skip_reason, Some(SkipReason::PipelineDisabled));
        assert_eq!(h.script.vision_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_image_skipped() {
        let (factory, script) = ScriptedFactory::new();
        let h = harness(enabled_config(), factory, script);
        h.media.insert(MediaItem {
            mime_type: "application/pdf".into(),
            ..image(1)
        });

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.skip_reason, Some(SkipReason::NotAnImage));
        assert_eq!(h.script.vision_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_media_fails_describe_stage() {
        let (factory, script) = ScriptedFactory::new();
        let h = harness(enabled_config(), factory, script);

        let result = h.pipeline.run(PipelineRequest::new(404)).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failed_stage, Some(Stage::Describe));
    }

    #[tokio::test]
    async fn test_preserve_existing_skips_without_backend_calls() {
        let (factory, script) = ScriptedFactory::new();
        let config = enabled_config().with(keys::PRESERVE_EXISTING, "1");
        let h = harness(config, factory, script);
        h.media.insert(MediaItem {
            existing_description: Some("Hand-written alt text".into()),
            ..image(1)
        });

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.skip_reason, Some(SkipReason::DescriptionPreserved));
        assert_eq!(h.script.vision_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.media.description(1).as_deref(),
            Some("Hand-written alt text")
        );
    }

    #[tokio::test]
    async fn test_force_overwrite_replaces_preserved_description() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("A lighthouse at dusk.".into()));
        let config = enabled_config()
            .with(keys::PRESERVE_EXISTING, "1")
            .with(keys::CONTEXTUAL_AWARENESS, "0");
        let h = harness(config, factory, script);
        h.media.insert(MediaItem {
            existing_description: Some("old".into()),
            ..image(1)
        });

        let request = PipelineRequest {
            force_overwrite: true,
            ..PipelineRequest::new(1)
        };
        let result = h.pipeline.run(request).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(h.media.description(1).as_deref(), Some("A lighthouse at dusk."));
    }

    #[tokio::test]
    async fn test_vision_only_success_without_context() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(
            &script,
            Ok("A red bicycle leaning against a brick wall.".into()),
        );
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.caption, "A red bicycle leaning against a brick wall.");
        assert!(result.caption.chars().count() <= 120);
        assert_eq!(h.script.vision_calls.load(Ordering::SeqCst), 1);
        // No entity context attached, so the refinement stage never runs
        assert_eq!(h.script.text_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.media.description(1).as_deref(),
            Some("A red bicycle leaning against a brick wall.")
        );
    }

    #[tokio::test]
    async fn test_fallback_recovers_after_primary_failure() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Err(AltTextError::http_status("gradio", 503, "")));
        push_vision(&script, Ok("A harbor full of sailboats.".into()));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(h.script.vision_calls.load(Ordering::SeqCst), 2);

        // Exactly one failure record, then the recovery record
        let errors = h.audit.messages_at(LogLevel::Error);
        assert_eq!(errors, vec!["vision backend failed"]);
        assert!(
            h.audit
                .messages_at(LogLevel::Success)
                .contains(&"describe stage recovered via fallback".to_string())
        );
    }

    #[tokio::test]
    async fn test_exhausted_fallback_fails_describe_stage() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Err(AltTextError::call_failed("gradio", "down")));
        push_vision(&script, Err(AltTextError::call_failed("inference", "down")));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failed_stage, Some(Stage::Describe));
        assert_eq!(h.script.vision_calls.load(Ordering::SeqCst), 2);
        assert!(h.media.description(1).is_none());
    }

    #[tokio::test]
    async fn test_refinement_rewrites_caption_with_context() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("A dog on sand.".into()));
        push_text(&script, Ok("A corgi playing on the beach at Skagen.".into()));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));
        h.media.attach_context(
            1,
            EntityContext {
                title: "Summer in Skagen".into(),
                entity_type: "post".into(),
                ..Default::default()
            },
        );

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.caption, "A corgi playing on the beach at Skagen.");
        assert_eq!(h.script.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refinement_failure_keeps_vision_description() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("A dog on sand.".into()));
        push_text(&script, Err(AltTextError::call_failed("chat", "overloaded")));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));
        h.media.attach_context(
            1,
            EntityContext {
                title: "Summer in Skagen".into(),
                ..Default::default()
            },
        );

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.caption, "A dog on sand.");
        assert!(
            h.audit
                .messages_at(LogLevel::Warning)
                .contains(&"refinement failed, keeping image description".to_string())
        );
    }

    #[tokio::test]
    async fn test_unavailable_text_backend_is_a_soft_skip() {
        let (factory, script) = ScriptedFactory::without_text_backend();
        push_vision(&script, Ok("A dog on sand.".into()));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));
        h.media.attach_context(
            1,
            EntityContext {
                title: "Summer in Skagen".into(),
                ..Default::default()
            },
        );

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.caption, "A dog on sand.");
        assert_eq!(h.script.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_contextual_awareness_disabled_skips_refinement() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("A dog on sand.".into()));
        let config = enabled_config().with(keys::CONTEXTUAL_AWARENESS, "0");
        let h = harness(config, factory, script);
        h.media.insert(image(1));
        h.media.attach_context(
            1,
            EntityContext {
                title: "Summer in Skagen".into(),
                ..Default::default()
            },
        );

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(h.script.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_caption_is_sanitized_and_capped() {
        let (factory, script) = ScriptedFactory::new();
        let rambling = format!("\"{}\"", "A very long description. ".repeat(20));
        push_vision(&script, Ok(rambling));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.caption.chars().count(), 120);
        assert!(result.caption.ends_with("..."));
        assert!(!result.caption.starts_with('"'));
    }

    #[tokio::test]
    async fn test_caption_empty_after_sanitization_fails() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("\"  \"".into()));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));

        let result = h.pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failed_stage, Some(Stage::Describe));
    }

    #[tokio::test]
    async fn test_backend_override_uses_that_backend_default_model() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Err(AltTextError::call_failed("openai", "quota")));
        push_vision(&script, Err(AltTextError::call_failed("openai", "quota")));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(1));

        let request = PipelineRequest {
            backend_override: Some(BackendKind::OpenAi),
            ..PipelineRequest::new(1)
        };
        let result = h.pipeline.run(request).await;

        // OpenAI falls back onto itself with the lighter model, so two calls
        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(h.script.vision_calls.load(Ordering::SeqCst), 2);
        let errors = h.audit.records();
        let first_error = errors
            .iter()
            .find(|r| r.level == LogLevel::Error)
            .expect("primary failure logged");
        assert_eq!(first_error.fields["backend"], "openai");
    }

    #[tokio::test]
    async fn test_every_audit_record_carries_the_run_id() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("A quiet street.".into()));
        let h = harness(enabled_config(), factory, script);
        h.media.insert(image(7));

        let result = h.pipeline.run(PipelineRequest::new(7)).await;

        let records = h.audit.records();
        assert!(!records.is_empty());
        for record in &records {
            assert_eq!(record.correlation, Some(7));
            assert_eq!(record.fields["run_id"], result.run_id.to_string());
        }
    }

    // Store wrappers for persistence-edge tests

    struct RejectingWrites(MemoryMediaStore);

    #[async_trait]
    impl MediaStore for RejectingWrites {
        async fn get_by_id(&self, id: MediaId) -> Result<MediaItem> {
            self.0.get_by_id(id).await
        }
        async fn existing_description(&self, id: MediaId) -> Result<Option<String>> {
            self.0.existing_description(id).await
        }
        async fn set_description(&self, _id: MediaId, _text: &str) -> Result<()> {
            Err(AltTextError::PersistenceFailed("read-only host".into()))
        }
        async fn owning_entity_context(&self, id: MediaId) -> Result<Option<EntityContext>> {
            self.0.owning_entity_context(id).await
        }
    }

    #[tokio::test]
    async fn test_rejected_write_fails_persist_stage() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("A quiet street.".into()));
        let inner = MemoryMediaStore::new();
        inner.insert(image(1));
        let audit = Arc::new(MemoryAuditLog::new());
        let pipeline = Pipeline::new(
            Arc::new(enabled_config()),
            Arc::new(RejectingWrites(inner)),
            audit.clone(),
        )
        .with_factory(factory);

        let result = pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failed_stage, Some(Stage::Persist));
        assert!(
            audit
                .messages_at(LogLevel::Error)
                .contains(&"description write rejected by host".to_string())
        );
    }

    /// Simulates a concurrent invocation writing between the initial read
    /// and the pre-write re-check.
    struct DescriptionAppears(MemoryMediaStore);

    #[async_trait]
    impl MediaStore for DescriptionAppears {
        async fn get_by_id(&self, id: MediaId) -> Result<MediaItem> {
            self.0.get_by_id(id).await
        }
        async fn existing_description(&self, _id: MediaId) -> Result<Option<String>> {
            Ok(Some("written elsewhere".into()))
        }
        async fn set_description(&self, id: MediaId, text: &str) -> Result<()> {
            self.0.set_description(id, text).await
        }
        async fn owning_entity_context(&self, id: MediaId) -> Result<Option<EntityContext>> {
            self.0.owning_entity_context(id).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_write_detected_before_persisting() {
        let (factory, script) = ScriptedFactory::new();
        push_vision(&script, Ok("A quiet street.".into()));
        let inner = MemoryMediaStore::new();
        inner.insert(image(1));
        let audit = Arc::new(MemoryAuditLog::new());
        let media = Arc::new(DescriptionAppears(inner));
        let pipeline = Pipeline::new(Arc::new(enabled_config()), media, audit.clone())
            .with_factory(factory);

        let result = pipeline.run(PipelineRequest::new(1)).await;

        assert_eq!(result.outcome, Outcome::Skipped);
        assert_eq!(result.skip_reason, Some(SkipReason::DescriptionPreserved));
    }
}
