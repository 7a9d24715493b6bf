//! Fallback Policy
//!
//! Bounded single-substitution recovery, not a retry loop. On a stage-1
//! backend failure the pipeline attempts exactly one designated fallback
//! backend before declaring the stage failed. Stage-2 failures have no
//! fallback backend at all - the stage-1 description is kept.

use crate::constants::models;
use crate::types::{BackendDescriptor, BackendKind};

/// The one substitute backend tried after a primary vision failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPlan {
    pub kind: BackendKind,
    pub model: String,
}

/// Resolves the designated fallback for a failed vision backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPolicy;

impl FallbackPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Designated substitute for a failed stage-1 backend, or `None` when
    /// the substitution would repeat the failed configuration.
    pub fn vision_fallback(&self, failed: &BackendDescriptor) -> Option<FallbackPlan> {
        let plan = match failed.backend {
            // The hosted polling space degrades to the lighter direct-call
            // captioner
            BackendKind::Gradio => FallbackPlan {
                kind: BackendKind::Inference,
                model: models::BLIP_BASE.to_string(),
            },
            // And the reverse: direct-call failures try the polling space
            BackendKind::Inference => FallbackPlan {
                kind: BackendKind::Gradio,
                model: models::JOY_CAPTION.to_string(),
            },
            // Chat vision stays on the same API with a lighter model
            BackendKind::OpenAi => FallbackPlan {
                kind: BackendKind::OpenAi,
                model: models::GPT4O_MINI.to_string(),
            },
            BackendKind::Chat => return None,
        };

        if plan.kind == failed.backend && plan.model == failed.model {
            return None;
        }
        Some(plan)
    }
}
