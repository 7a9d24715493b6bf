//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// HTTP/Network constants
pub mod network {
    /// Timeout for direct backend calls and job submission (seconds)
    pub const SUBMIT_TIMEOUT_SECS: u64 = 30;

    /// Timeout for polling-result retrieval - model inference latency dominates (seconds)
    pub const POLL_TIMEOUT_SECS: u64 = 120;

    /// Timeout for chat-completion refinement calls (seconds)
    pub const CHAT_TIMEOUT_SECS: u64 = 60;

    /// Timeout for fetching image bytes from the host (seconds)
    pub const IMAGE_FETCH_TIMEOUT_SECS: u64 = 30;

    /// Maximum response body length carried into audit log fields
    pub const LOG_BODY_PREVIEW_LEN: usize = 500;
}

/// Caption length policy
pub mod caption {
    /// Visible-character cap for logographic/dense scripts (zh, ja, ko)
    pub const DENSE_SCRIPT_CAP: usize = 50;

    /// Visible-character cap for alphabetic languages
    pub const ALPHABETIC_CAP: usize = 120;

    /// Ellipsis marker appended on truncation
    pub const ELLIPSIS: &str = "...";

    /// Maximum characters of entity body excerpt embedded in the refinement prompt
    pub const EXCERPT_PROMPT_LEN: usize = 200;
}

/// Polling (Gradio-style) backend constants
pub mod gradio {
    /// Sampling temperature for caption generation
    pub const TEMPERATURE: f64 = 0.6;

    /// Nucleus sampling value
    pub const TOP_P: f64 = 0.9;

    /// Maximum new tokens per caption
    pub const MAX_NEW_TOKENS: u32 = 256;

    /// Default call endpoint for the hosted caption space
    pub const DEFAULT_ENDPOINT: &str =
        "https://fancyfeast-joy-caption-beta-one.hf.space/gradio_api/call/chat_joycaption";
}

/// Refinement backend constants
pub mod refine {
    /// Maximum tokens for the refined caption
    pub const MAX_TOKENS: u32 = 100;

    /// Low temperature keeps refinement close to the source description
    pub const TEMPERATURE: f64 = 0.3;

    /// Default chat-completion router endpoint
    pub const DEFAULT_ENDPOINT: &str = "https://router.huggingface.co/v1/chat/completions";
}

/// Default model identifiers per backend family
pub mod models {
    /// Polling caption model (primary vision default)
    pub const JOY_CAPTION: &str = "joy-caption-beta-one";

    /// Direct-call captioning model (designated vision fallback)
    pub const BLIP_BASE: &str = "Salesforce/blip-image-captioning-base";

    /// Refinement model default
    pub const LLAMA31_8B: &str = "meta-llama/Llama-3.1-8B-Instruct";

    /// Chat vision model default
    pub const GPT4O: &str = "gpt-4o";

    /// Lighter chat vision model used as the designated fallback
    pub const GPT4O_MINI: &str = "gpt-4o-mini";
}

/// Default endpoints for direct-call backends
pub mod endpoints {
    /// HuggingFace Inference API base (model name is appended)
    pub const INFERENCE_API_BASE: &str = "https://api-inference.huggingface.co/models";

    /// OpenAI-compatible API base
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
}
