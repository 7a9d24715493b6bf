//! AI Integration Layer
//!
//! Backend clients, wire-format normalization, prompt composition, and
//! caption sanitization.

pub mod prompt;
pub mod provider;
pub mod sanitize;
pub mod timeout;
pub mod wire;

pub use prompt::{DEFAULT_VISION_PROMPT, LanguageProfile};
pub use provider::{
    ChatTextProvider, GradioVisionProvider, InferenceVisionProvider, OpenAiVisionProvider,
    ProviderConfig, SharedTextProvider, SharedVisionProvider, TextProvider, VisionProvider,
    create_text_provider, create_vision_provider,
};
pub use timeout::{Timeouts, with_timeout};
