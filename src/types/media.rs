//! Pipeline Data Model
//!
//! Core value types flowing through the two-stage pipeline: the media item
//! being captioned, the contextual snapshot of its owning entity, backend
//! descriptors, and the request/result pair of one invocation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Host-assigned media item identifier (doubles as the log correlation id)
pub type MediaId = u64;

/// Host-assigned owning-entity identifier
pub type EntityId = u64;

/// A media item as seen by the pipeline.
///
/// Read-only except for the description, which the pipeline writes at most
/// once per successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    /// Binary-resource locator for the image
    pub url: String,
    /// MIME type as recorded by the host
    pub mime_type: String,
    pub existing_description: Option<String>,
    pub parent_entity: Option<EntityId>,
}

impl MediaItem {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn has_description(&self) -> bool {
        self.existing_description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Read-only snapshot of the entity a media item belongs to, computed at
/// invocation time and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityContext {
    pub title: String,
    /// Plain-text body excerpt, already stripped of markup by the host
    pub excerpt: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Entity-type label ("post", "page", "product", ...)
    pub entity_type: String,
}

impl EntityContext {
    /// An all-empty context degrades the pipeline to vision-only output.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.excerpt.trim().is_empty()
            && self.categories.is_empty()
            && self.tags.is_empty()
            && self.entity_type.trim().is_empty()
    }
}

// =============================================================================
// Backend Descriptors
// =============================================================================

/// Backend families the pipeline can orchestrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Submit-then-poll Gradio space (vision)
    Gradio,
    /// Direct-call inference API with legacy array responses (vision)
    Inference,
    /// Chat-completion API with image URL content (vision)
    OpenAi,
    /// Chat-completion API for text refinement
    Chat,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gradio => "gradio",
            Self::Inference => "inference",
            Self::OpenAi => "openai",
            Self::Chat => "chat",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-protocol variant a backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireVariant {
    /// Single POST, flat JSON object response
    DirectJson,
    /// Two-phase submit/poll with SSE or `{data:[...]}` results
    Polling,
    /// Single POST, legacy `[{generated_text}]` array response
    ArrayLegacy,
}

/// Identity and capabilities of one configured backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub backend: BackendKind,
    pub model: String,
    pub supports_custom_prompt: bool,
    pub supports_context_injection: bool,
    pub wire: WireVariant,
}

// =============================================================================
// Request / Result
// =============================================================================

/// One caption-generation request handed to the pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub media_id: MediaId,
    /// Explicit vision prompt, overriding the configured template
    pub prompt_override: Option<String>,
    /// Explicit vision backend, overriding the configured selection
    pub backend_override: Option<BackendKind>,
    /// Write even when a description already exists
    pub force_overwrite: bool,
}

impl PipelineRequest {
    pub fn new(media_id: MediaId) -> Self {
        Self {
            media_id,
            ..Default::default()
        }
    }
}

/// Pipeline stages, recorded on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Describe,
    Refine,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Describe => write!(f, "describe"),
            Self::Refine => write!(f, "refine"),
            Self::Persist => write!(f, "persist"),
        }
    }
}

/// Why an invocation was skipped before any backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    PipelineDisabled,
    NotAnImage,
    DescriptionPreserved,
}

/// Terminal outcome of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Skipped,
    Failed,
}

/// Result of `Pipeline::run`. Failures are encoded here, not raised.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Final caption (empty unless outcome is `Success`)
    pub caption: String,
    pub outcome: Outcome,
    pub failed_stage: Option<Stage>,
    pub skip_reason: Option<SkipReason>,
    /// Unique id of this invocation, carried in every audit record
    pub run_id: Uuid,
}

impl PipelineResult {
    pub fn success(run_id: Uuid, caption: String) -> Self {
        Self {
            caption,
            outcome: Outcome::Success,
            failed_stage: None,
            skip_reason: None,
            run_id,
        }
    }

    pub fn skipped(run_id: Uuid, reason: SkipReason) -> Self {
        Self {
            caption: String::new(),
            outcome: Outcome::Skipped,
            failed_stage: None,
            skip_reason: Some(reason),
            run_id,
        }
    }

    pub fn failed(run_id: Uuid, stage: Stage) -> Self {
        Self {
            caption: String::new(),
            outcome: Outcome::Failed,
            failed_stage: Some(stage),
            skip_reason: None,
            run_id,
        }
    }
}

/// Diagnostic record of a single backend call.
///
/// Ephemeral: exists only inside one invocation and feeds audit log fields.
#[derive(Debug, Clone)]
pub struct GenerationAttempt {
    pub descriptor: BackendDescriptor,
    pub elapsed: Duration,
    /// Extracted text, when the call produced one
    pub text: Option<String>,
}

impl GenerationAttempt {
    /// Visible-character count of the extracted text
    pub fn chars(&self) -> usize {
        self.text.as_deref().map_or(0, |t| t.chars().count())
    }
}
