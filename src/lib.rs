//! Contextual Alt Text - AI-Driven Image Caption Pipeline
//!
//! Generates alternative-text captions for image media items through a
//! two-stage flow: a vision backend describes the image, then a text
//! backend rewrites the description using the context of the page the
//! image belongs to.
//!
//! ## Core Features
//!
//! - **Pluggable Backends**: Gradio polling spaces, direct inference
//!   endpoints, and OpenAI-compatible chat APIs behind one trait pair
//! - **Bounded Fallback**: exactly one designated substitute backend per
//!   vision failure, never a retry loop
//! - **Soft Refinement**: context rewriting is an enhancement; any
//!   stage-2 failure keeps the stage-1 description
//! - **Language-Aware Output**: per-language prompts and caption length
//!   caps, with boilerplate-prefix and quote stripping
//!
//! ## Quick Start
//!
//! ```ignore
//! use contextual_alt_text::{Outcome, Pipeline, PipelineRequest};
//!
//! let pipeline = Pipeline::new(config, media, audit);
//! let result = pipeline.run(PipelineRequest::new(attachment_id)).await;
//! if result.outcome == Outcome::Success {
//!     println!("{}", result.caption);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: backend clients, wire normalization, prompts, sanitization
//! - [`pipeline`]: the orchestrator and fallback policy
//! - [`config`]: host option storage and the typed settings snapshot
//! - [`host`]: media store and audit log collaborator traits

pub mod ai;
pub mod config;
pub mod constants;
pub mod host;
pub mod pipeline;
pub mod telemetry;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Orchestration
pub use pipeline::{FallbackPlan, FallbackPolicy, Pipeline, ProviderFactory};

// Configuration
pub use config::{ConfigStore, MemoryConfig, PipelineSettings};

// Host Collaborators
pub use host::{AuditLog, LogLevel, MediaStore, MemoryAuditLog, MemoryMediaStore};

// Error Types
pub use types::{AltTextError, Result};

// Data Model
pub use types::{
    BackendDescriptor, BackendKind, EntityContext, MediaItem, Outcome, PipelineRequest,
    PipelineResult, SkipReason, Stage, WireVariant,
};
