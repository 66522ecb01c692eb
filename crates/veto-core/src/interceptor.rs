//! The interceptor (C8): composes the validation engine, the Cloud
//! approval-polling state machine, and the history tracker around one tool
//! invocation. Grounded on `Veto._validate_with_cloud` /
//! `Veto._validate_tool_call` in the reference `veto/core/veto.py`.

use crate::cloud::{ApiContext, ApprovalPollOptions, ApprovalStatus, CloudClient, Decision};
use crate::engine::{AggregatedResult, ValidationContext, ValidationEngine, ValidationResult};
use crate::history::{HistoryTracker, ToolCallHistoryEntry};
use crate::tool::ToolCall;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Whether a `deny` reaches the caller as-is (`Strict`, the default) or is
/// rewritten to an `allow` carrying a `blocked_in_strict_mode` flag (`Log`),
/// used to observe what a policy *would* have done before enforcing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorMode {
    Strict,
    Log,
}

impl Default for InterceptorMode {
    fn default() -> Self {
        Self::Strict
    }
}

/// Invoked when the chain's final decision is `require_approval` and an
/// `approval_id` is available, before polling begins. Receives the tool name
/// and the approval id, so a consumer can tell a human which tool is waiting.
pub type ApprovalRequiredHook = dyn Fn(&str, &str) + Send + Sync;

/// The outcome of [`Interceptor::intercept`]: a fully resolved `allow`/`deny`
/// boundary decision plus enough context for the caller (the tool wrapper,
/// typically) to act on it. `Decision::RequireApproval` never appears here.
/// It is always resolved to `Allow` or `Deny` before this value exists.
#[derive(Debug, Clone)]
pub struct InterceptionResult {
    pub allowed: bool,
    pub original_call: ToolCall,
    pub final_arguments: Option<Value>,
    pub validation_result: ValidationResult,
}

/// Composes C6 (the validation engine) and C4's approval loop around a
/// single call, and records the outcome to C7.
pub struct Interceptor {
    engine: ValidationEngine,
    cloud_client: Arc<dyn CloudClient>,
    history: Arc<HistoryTracker>,
    mode: InterceptorMode,
    session_id: Option<String>,
    agent_id: Option<String>,
    poll_options: ApprovalPollOptions,
    on_approval_required: Option<Arc<ApprovalRequiredHook>>,
}

impl Interceptor {
    pub fn new(
        engine: ValidationEngine,
        cloud_client: Arc<dyn CloudClient>,
        history: Arc<HistoryTracker>,
    ) -> Self {
        Self {
            engine,
            cloud_client,
            history,
            mode: InterceptorMode::Strict,
            session_id: None,
            agent_id: None,
            poll_options: ApprovalPollOptions::default(),
            on_approval_required: None,
        }
    }

    pub fn with_mode(mut self, mode: InterceptorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_identity(mut self, session_id: Option<String>, agent_id: Option<String>) -> Self {
        self.session_id = session_id;
        self.agent_id = agent_id;
        self
    }

    pub fn with_poll_options(mut self, options: ApprovalPollOptions) -> Self {
        self.poll_options = options;
        self
    }

    pub fn with_approval_hook(mut self, hook: Arc<ApprovalRequiredHook>) -> Self {
        self.on_approval_required = Some(hook);
        self
    }

    /// Runs the full pipeline for one call: build context, run the engine,
    /// resolve any pending approval, apply the interceptor's mode, record
    /// history, and return the boundary decision.
    pub async fn intercept(&self, call: ToolCall) -> InterceptionResult {
        let start = Instant::now();
        let history_snapshot: Arc<[ToolCallHistoryEntry]> =
            Arc::from(self.history.snapshot().into_boxed_slice());

        let ctx = ValidationContext {
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            call_id: call.id.clone(),
            timestamp: Utc::now(),
            call_history: history_snapshot,
            custom: None,
        };

        let mut aggregated = self.engine.validate(&ctx).await;

        if aggregated.final_result.decision == Decision::RequireApproval {
            aggregated.final_result = self
                .resolve_approval(&call.name, &aggregated.final_result)
                .await;
        }

        let mut final_result = aggregated.final_result.clone();
        if self.mode == InterceptorMode::Log && final_result.decision == Decision::Deny {
            final_result = rewrite_for_log_mode(&final_result);
        }

        let allowed = final_result.decision == Decision::Allow;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        self.history.record(ToolCallHistoryEntry {
            call: call.clone(),
            result: AggregatedResult {
                final_result: final_result.clone(),
                validator_results: aggregated.validator_results,
            },
            timestamp: Utc::now(),
            latency_ms,
        });

        self.cloud_client.log_decision(crate::cloud::DecisionLogRequest {
            tool_name: call.name.clone(),
            call_id: call.id.clone(),
            decision: final_result.decision,
            reason: final_result.reason.clone(),
        });

        InterceptionResult {
            allowed,
            original_call: call,
            final_arguments: None,
            validation_result: final_result,
        }
    }

    /// Resolves a `require_approval` verdict into `Allow`/`Deny` by polling
    /// Cloud for the human decision. A `require_approval` with no
    /// `approval_id` is a misconfigured validator and is denied fail-closed,
    /// never silently allowed.
    async fn resolve_approval(&self, tool_name: &str, pending: &ValidationResult) -> ValidationResult {
        let Some(approval_id) = pending
            .metadata
            .as_ref()
            .and_then(|m| m.get("approval_id"))
            .and_then(|v| v.as_str())
        else {
            return ValidationResult::deny(
                "Validator requested approval but provided no approval_id; denying fail-closed",
            );
        };

        if let Some(hook) = &self.on_approval_required {
            hook(tool_name, approval_id);
        }

        match self
            .cloud_client
            .poll_approval(approval_id, self.poll_options)
            .await
        {
            Ok(data) => match data.status {
                ApprovalStatus::Approved => ValidationResult {
                    decision: Decision::Allow,
                    reason: Some(format!(
                        "Approved by {}",
                        data.resolved_by.as_deref().unwrap_or("unknown")
                    )),
                    metadata: None,
                },
                ApprovalStatus::Denied => {
                    ValidationResult::deny("Approval was denied by reviewer")
                }
                ApprovalStatus::Expired => ValidationResult::deny("Approval request expired"),
                ApprovalStatus::Pending => {
                    ValidationResult::deny("Approval did not resolve before returning")
                }
            },
            Err(_timeout) => {
                ValidationResult::deny("Approval timed out waiting for human review")
            }
        }
    }

    /// Constructs an [`ApiContext`] for the Cloud `validate` call, from the
    /// ambient session/agent identity configured on this interceptor.
    pub fn api_context(&self, call: &ToolCall) -> ApiContext {
        ApiContext {
            call_id: Some(call.id.clone()),
            timestamp: Some(Utc::now().to_rfc3339()),
            session_id: self.session_id.clone(),
            agent_id: self.agent_id.clone(),
            custom: None,
        }
    }
}

fn rewrite_for_log_mode(result: &ValidationResult) -> ValidationResult {
    let reason = format!(
        "[LOG MODE] Would block: {}",
        result.reason.as_deref().unwrap_or("no reason given")
    );
    let mut metadata = result.metadata.clone().unwrap_or_else(|| serde_json::json!({}));
    if let Value::Object(map) = &mut metadata {
        map.insert("blocked_in_strict_mode".to_string(), Value::Bool(true));
    }
    ValidationResult {
        decision: Decision::Allow,
        reason: Some(reason),
        metadata: Some(metadata),
    }
}
