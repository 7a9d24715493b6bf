//! Core Types
//!
//! Data model and error types shared across the pipeline.

pub mod error;
pub mod media;

pub use error::{AltTextError, Result, body_preview};
pub use media::{
    BackendDescriptor, BackendKind, EntityContext, EntityId, GenerationAttempt, MediaId,
    MediaItem, Outcome, PipelineRequest, PipelineResult, SkipReason, Stage, WireVariant,
};
