//! Wire types exchanged with the Veto Cloud API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of a single tool parameter, sent during registration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A tool's registration payload: name, description, and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolRegistration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

/// Outcome of a `register_tools` call. `success` is false only after all
/// retries are exhausted; registration never raises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRegistrationResponse {
    pub success: bool,
    pub registered_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A single failed constraint as reported by the Cloud validation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedConstraint {
    pub parameter: String,
    pub constraint_type: String,
    #[serde(default)]
    pub expected: Value,
    #[serde(default)]
    pub actual: Value,
    pub message: String,
}

/// The decision returned by a validator, at any layer of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    RequireApproval,
}

/// Response from `POST /v1/tools/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub failed_constraints: Vec<FailedConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
}

impl ValidationResponse {
    /// The synthetic, fail-closed response returned when the transport to
    /// Cloud fails after all retries are exhausted.
    pub fn transport_failure(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: Some(reason.into()),
            failed_constraints: Vec::new(),
            metadata: Some(serde_json::json!({ "api_error": true })),
            approval_id: None,
        }
    }
}

/// Status of a pending human-in-the-loop approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

/// The resolved (or still-pending) state of an approval record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalData {
    pub id: String,
    pub status: ApprovalStatus,
    #[serde(default, rename = "toolName", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, rename = "resolvedBy", skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

/// Polling cadence and deadline for [`super::CloudClient::poll_approval`].
#[derive(Debug, Clone, Copy)]
pub struct ApprovalPollOptions {
    pub poll_interval: std::time::Duration,
    pub timeout: std::time::Duration,
}

impl Default for ApprovalPollOptions {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(2),
            timeout: std::time::Duration::from_secs(300),
        }
    }
}

/// Free-form context attached to a validation request: call id, timestamp,
/// session/agent identity, and caller-supplied custom fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

/// A fire-and-forget decision record sent to `POST /v1/decisions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLogRequest {
    pub tool_name: String,
    pub call_id: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
