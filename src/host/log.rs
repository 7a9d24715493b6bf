//! Audit Log Collaborator
//!
//! The host provides a structured audit sink; every pipeline step writes one
//! record through it, correlated by media item id. Internal diagnostics use
//! `tracing` separately - the audit log is the durable, host-visible stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

use crate::types::MediaId;

/// Audit record severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// Host audit-log sink.
///
/// Must be safe for concurrent use; one sink is shared across invocations.
pub trait AuditLog: Send + Sync {
    fn write(&self, level: LogLevel, message: &str, fields: Value, correlation: Option<MediaId>);
}

/// One captured audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub fields: Value,
    pub correlation: Option<MediaId>,
}

/// In-memory audit log for tests and hosts without a durable sink.
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit mutex poisoned").clone()
    }

    /// Messages at a given level, in write order
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .map(|r| r.message)
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn write(&self, level: LogLevel, message: &str, fields: Value, correlation: Option<MediaId>) {
        self.records
            .lock()
            .expect("audit mutex poisoned")
            .push(AuditRecord {
                timestamp: Utc::now(),
                level,
                message: message.to_string(),
                fields,
                correlation,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_log_captures_records() {
        let log = MemoryAuditLog::new();
        log.write(LogLevel::Info, "starting", json!({"url": "a.jpg"}), Some(7));
        log.write(LogLevel::Error, "backend failed", json!({}), Some(7));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].correlation, Some(7));
        assert_eq!(records[0].fields["url"], "a.jpg");
        assert_eq!(log.messages_at(LogLevel::Error), vec!["backend failed"]);
    }

    #[test]
    fn test_level_display() {
        assert_eq!(LogLevel::Success.to_string(), "success");
        assert_eq!(LogLevel::Warning.to_string(), "warning");
    }
}
