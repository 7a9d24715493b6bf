//! Wire Format Normalization
//!
//! Backends answer in three incompatible shapes plus the common
//! chat-completion envelope. This module classifies a raw response body and
//! extracts the generated text, in priority order:
//!
//! 1. Server-Sent-Event stream (both `event:` and `data:` markers present) -
//!    scan every frame, keep the **last** non-empty string at index 0;
//!    earlier frames may be partial or interim
//! 2. JSON object with a `data` array - index 0 when it is a string
//! 3. Chat-completion shape - `choices[0].message.content`
//! 4. Legacy array of `{generated_text}` objects - first entry
//!
//! Anything else yields `None`, which callers surface as a backend failure.

use serde_json::Value;
use tracing::debug;

/// Extract generated text from a raw response body.
pub fn extract_text(body: &str) -> Option<String> {
    if body.contains("event:") && body.contains("data:") {
        return parse_sse(body);
    }

    let value: Value = serde_json::from_str(body).ok()?;
    extract_from_value(&value)
}

fn extract_from_value(value: &Value) -> Option<String> {
    // {"data": ["text", ...], "is_generating": false, ...}
    if let Some(first) = value.get("data").and_then(Value::as_array).and_then(|a| a.first())
        && let Some(text) = first.as_str()
    {
        return non_empty(text);
    }

    // {"choices": [{"message": {"content": "text"}}]}
    if let Some(content) = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    {
        return non_empty(content);
    }

    // [{"generated_text": "text"}, ...]
    if let Some(text) = value
        .as_array()
        .and_then(|a| a.first())
        .and_then(|o| o.get("generated_text"))
        .and_then(Value::as_str)
    {
        return non_empty(text);
    }

    debug!("no recognized text field in response body");
    None
}

/// Scan an SSE stream, keeping the last non-empty textual payload.
///
/// Each `data:` line carries a JSON array whose first element is the caption
/// so far; only the final frame holds the complete text.
fn parse_sse(body: &str) -> Option<String> {
    let mut last = None;

    for line in body.lines() {
        let line = line.trim();
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(payload.trim()) else {
            continue;
        };
        if let Some(text) = value.as_array().and_then(|a| a.first()).and_then(Value::as_str)
            && !text.trim().is_empty()
        {
            last = Some(text.trim().to_string());
        }
    }

    last
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
