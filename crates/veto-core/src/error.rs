//! Crate-level error surface.
//!
//! Most components return a domain-specific result type directly
//! (`LocalValidationResult`, `ValidationResponse`, …) rather than an `Err`,
//! per the "errors as control flow become result types" design note. The
//! few exceptions that do cross a boundary as a typed error are collected
//! here so the façade can match on them without downcasting `anyhow::Error`.

use crate::engine::ValidationResult;
use crate::policy_ir::PolicySchemaError;
use std::time::Duration;

/// Raised at the wrapped-tool surface when a call is denied. The only
/// control-flow error a caller of [`crate::wrapper`] should expect.
#[derive(Debug, thiserror::Error)]
#[error("tool call '{tool_name}' (id {call_id}) was denied: {}", validation_result.reason.as_deref().unwrap_or("no reason given"))]
pub struct ToolCallDeniedError {
    pub tool_name: String,
    pub call_id: String,
    pub validation_result: ValidationResult,
}

/// Raised when [`crate::cloud::CloudClient::poll_approval`] does not resolve
/// before its deadline.
#[derive(Debug, thiserror::Error)]
#[error("approval {approval_id} was not resolved within {timeout:?}")]
pub struct ApprovalTimeoutError {
    pub approval_id: String,
    pub timeout: Duration,
}

/// Top-level error type for operations that can fail for more than one
/// reason and need to be matched on by callers.
#[derive(Debug, thiserror::Error)]
pub enum VetoError {
    #[error(transparent)]
    ToolCallDenied(#[from] ToolCallDeniedError),

    #[error(transparent)]
    ApprovalTimeout(#[from] ApprovalTimeoutError),

    #[error(transparent)]
    PolicySchema(#[from] PolicySchemaError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
