//! Configuration
//!
//! Key/value read interface over host option storage plus the typed
//! per-invocation settings snapshot.

pub mod settings;
pub mod store;

pub use settings::PipelineSettings;
pub use store::{ConfigStore, MemoryConfig, keys};
