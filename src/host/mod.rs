//! Host Collaborators
//!
//! Trait seams for the services the host system provides: media storage and
//! the audit-log sink. In-memory implementations back tests and hosts that
//! embed the pipeline directly.

pub mod log;
pub mod media;

pub use log::{AuditLog, AuditRecord, LogLevel, MemoryAuditLog};
pub use media::{MediaStore, MemoryMediaStore};
