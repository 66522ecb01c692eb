//! The call-site data type shared by the interceptor, the tool wrapper, and
//! the façade: a single attempted invocation of a named tool.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single attempted invocation of a named tool by an agent.
///
/// Immutable once created. `id` is generated by [`generate_tool_call_id`]
/// when the caller does not supply one.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: generate_tool_call_id(),
            name: name.into(),
            arguments,
            raw_arguments: None,
        }
    }

    /// Returns `self` with `id` filled in from [`generate_tool_call_id`] if
    /// it was empty.
    pub fn with_generated_id_if_missing(mut self) -> Self {
        if self.id.is_empty() {
            self.id = generate_tool_call_id();
        }
        self
    }
}

static CALL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a fresh, process-unique tool call id.
///
/// Combines wall-clock milliseconds with a monotonic counter so that ids
/// generated within the same millisecond never collide, without requiring a
/// UUID dependency this crate otherwise has no use for.
pub fn generate_tool_call_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = CALL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("call_{millis:x}_{seq:x}")
}
