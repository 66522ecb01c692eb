//! End-to-end scenarios exercising the façade through `Veto::with_cloud_client`,
//! one per literal scenario enumerated in the testable-properties section of
//! the specification this crate implements.

use serde_json::json;
use std::sync::Arc;
use veto_core::cloud::fake::FakeCloudClient;
use veto_core::cloud::{ApprovalData, ApprovalStatus, Decision};
use veto_core::engine::{NamedValidator, Validator, ValidationContext, ValidationResult};
use veto_core::veto::{Veto, VetoOptions};
use veto_core::wrapper::FnToolAdapter;

fn echo_tool() -> FnToolAdapter {
    FnToolAdapter::new(|args| async move { Ok(args) })
}

#[tokio::test]
async fn scenario_chain_short_circuit() {
    use async_trait::async_trait;

    struct Deny;
    #[async_trait]
    impl Validator for Deny {
        async fn validate(&self, _ctx: &ValidationContext) -> ValidationResult {
            ValidationResult::deny("A")
        }
    }
    struct Allow;
    #[async_trait]
    impl Validator for Allow {
        async fn validate(&self, _ctx: &ValidationContext) -> ValidationResult {
            ValidationResult::allow()
        }
    }

    let mut engine = veto_core::engine::ValidationEngine::new(ValidationResult::allow());
    engine.add_validator(NamedValidator::new("deny-at-10", 10, Arc::new(Deny)));
    engine.add_validator(NamedValidator::new("allow-at-20", 20, Arc::new(Allow)));

    let ctx = ValidationContext {
        tool_name: "pay".to_string(),
        arguments: json!({}),
        call_id: "call_1".to_string(),
        timestamp: chrono::Utc::now(),
        call_history: std::sync::Arc::from(Vec::new().into_boxed_slice()),
        custom: None,
    };
    let result = engine.validate(&ctx).await;
    assert_eq!(result.final_result.decision, Decision::Deny);
    assert_eq!(result.final_result.reason.as_deref(), Some("A"));
    assert_eq!(result.validator_results.len(), 1);
}

#[tokio::test]
async fn scenario_approval_approved_reaches_resolver_in_reason() {
    let cloud = FakeCloudClient::with_response(veto_core::cloud::ValidationResponse {
        decision: Decision::RequireApproval,
        reason: Some("needs human review".to_string()),
        failed_constraints: Vec::new(),
        metadata: None,
        approval_id: Some("X".to_string()),
    })
    .with_poll_result(Ok(ApprovalData {
        id: "X".to_string(),
        status: ApprovalStatus::Approved,
        tool_name: None,
        resolved_by: Some("admin".to_string()),
    }));

    let veto = Veto::with_cloud_client(VetoOptions::default(), Arc::new(cloud), Vec::new());
    let tool = veto.wrap("transfer", echo_tool(), None);

    let result = tool.invoke(json!({"amount": 5000})).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn scenario_approval_timeout_denies_with_fixed_reason() {
    let cloud = FakeCloudClient::with_response(veto_core::cloud::ValidationResponse {
        decision: Decision::RequireApproval,
        reason: Some("needs human review".to_string()),
        failed_constraints: Vec::new(),
        metadata: None,
        approval_id: Some("Y".to_string()),
    })
    .with_poll_result(Err(veto_core::error::ApprovalTimeoutError {
        approval_id: "Y".to_string(),
        timeout: std::time::Duration::from_millis(10),
    }));

    let veto = Veto::with_cloud_client(VetoOptions::default(), Arc::new(cloud), Vec::new());
    let tool = veto.wrap("transfer", echo_tool(), None);

    let result = tool.invoke(json!({"amount": 5000})).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn scenario_log_mode_never_raises_tool_call_denied() {
    let veto = Veto::with_cloud_client(
        VetoOptions {
            mode: veto_core::interceptor::InterceptorMode::Log,
            ..VetoOptions::default()
        },
        Arc::new(FakeCloudClient::denying("blocked by org policy")),
        Vec::new(),
    );
    let tool = veto.wrap("transfer", echo_tool(), None);

    let result = tool.invoke(json!({"amount": 1_000_000})).await;
    assert!(result.is_ok(), "log mode must never raise a denial");

    let stats = veto.get_history_stats();
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.allowed_calls, 1);
}

#[tokio::test]
async fn scenario_deterministic_policy_served_from_cache_without_cloud_roundtrip() {
    // Cloud's own `validate` response is irrelevant once the policy is
    // cached: it allows everything, yet the cached deterministic policy
    // still denies the out-of-range call below.
    let cloud = FakeCloudClient::allowing().with_fetch_policy(json!({
        "toolName": "pay",
        "mode": "deterministic",
        "constraints": [
            {"argumentName": "amount", "minimum": 0, "maximum": 1000}
        ]
    }));
    let veto = Veto::with_cloud_client(VetoOptions::default(), Arc::new(cloud), Vec::new());
    let tool = veto.wrap("pay", echo_tool(), None);

    // First call misses the cache (policy fetch is scheduled in the
    // background); give the fetch a moment to land, then call again.
    let _ = tool.invoke(json!({"amount": 500})).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let result = tool.invoke(json!({"amount": 500})).await;
    assert!(result.is_ok());

    let result = tool.invoke(json!({"amount": 5000})).await;
    assert!(result.is_err());
}
