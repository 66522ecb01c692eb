//! An in-memory [`CloudClient`] double for tests, in the same spirit as the
//! teacher's `providers::llm::fake` module: a trait implementation whose
//! entire behavior is configured by the test, with no network involved.

use super::client::CloudClient;
use super::types::{
    ApiContext, ApprovalData, ApprovalPollOptions, DecisionLogRequest, ToolRegistration,
    ToolRegistrationResponse, ValidationResponse,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// A [`CloudClient`] that returns a fixed [`ValidationResponse`] for every
/// call and records what it was asked to validate, for assertions.
pub struct FakeCloudClient {
    validate_response: ValidationResponse,
    poll_response: Mutex<Option<Result<ApprovalData, crate::error::ApprovalTimeoutError>>>,
    fetch_policy_response: Option<serde_json::Value>,
    registered_tools: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// One recorded `validate` invocation, for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub context: Option<ApiContext>,
}

impl FakeCloudClient {
    pub fn allowing() -> Self {
        Self::with_response(ValidationResponse {
            decision: super::types::Decision::Allow,
            reason: None,
            failed_constraints: Vec::new(),
            metadata: None,
            approval_id: None,
        })
    }

    pub fn denying(reason: impl Into<String>) -> Self {
        Self::with_response(ValidationResponse {
            decision: super::types::Decision::Deny,
            reason: Some(reason.into()),
            failed_constraints: Vec::new(),
            metadata: None,
            approval_id: None,
        })
    }

    pub fn with_response(response: ValidationResponse) -> Self {
        Self {
            validate_response: response,
            poll_response: Mutex::new(None),
            fetch_policy_response: None,
            registered_tools: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fetch_policy(mut self, policy: serde_json::Value) -> Self {
        self.fetch_policy_response = Some(policy);
        self
    }

    pub fn with_poll_result(
        self,
        result: Result<ApprovalData, crate::error::ApprovalTimeoutError>,
    ) -> Self {
        *self.poll_response.lock().unwrap() = Some(result);
        self
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudClient for FakeCloudClient {
    async fn register_tools(&self, tools: Vec<ToolRegistration>) -> ToolRegistrationResponse {
        let mut registered = self.registered_tools.lock().unwrap();
        let names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        for name in &names {
            registered.insert(name.clone());
        }
        ToolRegistrationResponse {
            success: true,
            registered_tools: names,
            message: None,
        }
    }

    async fn validate(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        context: Option<&ApiContext>,
    ) -> ValidationResponse {
        self.calls.lock().unwrap().push(RecordedCall {
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
            context: context.cloned(),
        });
        self.validate_response.clone()
    }

    async fn poll_approval(
        &self,
        approval_id: &str,
        _options: ApprovalPollOptions,
    ) -> Result<ApprovalData, crate::error::ApprovalTimeoutError> {
        self.poll_response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| {
                Ok(ApprovalData {
                    id: approval_id.to_string(),
                    status: super::types::ApprovalStatus::Approved,
                    tool_name: None,
                    resolved_by: Some("test".to_string()),
                })
            })
    }

    async fn fetch_policy(&self, _tool_name: &str) -> Option<serde_json::Value> {
        self.fetch_policy_response.clone()
    }

    fn log_decision(&self, _request: DecisionLogRequest) {}

    fn is_tool_registered(&self, tool_name: &str) -> bool {
        self.registered_tools.lock().unwrap().contains(tool_name)
    }

    fn clear_registration_cache(&self) {
        self.registered_tools.lock().unwrap().clear();
    }
}
