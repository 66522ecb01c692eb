//! The validation engine (C6): an ordered chain of [`Validator`]s, run with
//! per-validator panic isolation and short-circuited at the first
//! non-`allow` decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

pub use crate::cloud::Decision;
pub use crate::history::ToolCallHistoryEntry;

/// Read-only context handed to every validator for one call.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub tool_name: String,
    pub arguments: Value,
    pub call_id: String,
    pub timestamp: DateTime<Utc>,
    pub call_history: Arc<[ToolCallHistoryEntry]>,
    pub custom: Option<Value>,
}

/// What a single validator decided for one call.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub decision: Decision,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
}

impl ValidationResult {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: None,
            metadata: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: Some(reason.into()),
            metadata: None,
        }
    }

    pub fn require_approval(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::RequireApproval,
            reason: Some(reason.into()),
            metadata: None,
        }
    }

    pub fn is_allow(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// The thing a [`NamedValidator`] wraps: a single policy check over a call.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, ctx: &ValidationContext) -> ValidationResult;
}

#[async_trait]
impl<F> Validator for F
where
    F: Fn(&ValidationContext) -> ValidationResult + Send + Sync,
{
    async fn validate(&self, ctx: &ValidationContext) -> ValidationResult {
        self(ctx)
    }
}

/// A validator plus the metadata the engine schedules it by: smaller
/// `priority` runs first, ties broken by insertion order; `tool_filter`
/// restricts it to a subset of tool names.
#[derive(Clone)]
pub struct NamedValidator {
    pub name: String,
    pub description: Option<String>,
    pub priority: i32,
    pub tool_filter: Option<HashSet<String>>,
    validator: Arc<dyn Validator>,
}

impl NamedValidator {
    pub fn new(name: impl Into<String>, priority: i32, validator: Arc<dyn Validator>) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority,
            tool_filter: None,
            validator,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tool_filter(mut self, tools: HashSet<String>) -> Self {
        self.tool_filter = Some(tools);
        self
    }

    fn applies_to(&self, tool_name: &str) -> bool {
        match &self.tool_filter {
            Some(allowed) => allowed.contains(tool_name),
            None => true,
        }
    }
}

/// The outcome of running one validator: either it produced a result, or it
/// panicked and was isolated.
#[derive(Debug, Clone)]
pub enum ValidatorOutcome {
    Result(ValidationResult),
    Error(String),
}

/// The result of running the full chain for one call: the decision that
/// binds, plus every validator's individual outcome in evaluation order.
#[derive(Debug, Clone)]
pub struct AggregatedResult {
    pub final_result: ValidationResult,
    pub validator_results: Vec<(String, ValidatorOutcome)>,
}

/// Default priority for a [`NamedValidator`] that doesn't care about
/// ordering relative to others.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Runs an ordered chain of [`NamedValidator`]s against a [`ValidationContext`].
pub struct ValidationEngine {
    validators: Vec<NamedValidator>,
    default_decision: ValidationResult,
}

impl ValidationEngine {
    pub fn new(default_decision: ValidationResult) -> Self {
        Self {
            validators: Vec::new(),
            default_decision,
        }
    }

    pub fn add_validator(&mut self, validator: NamedValidator) {
        self.validators.push(validator);
    }

    /// Runs the chain: validators execute in `(priority, insertion order)`,
    /// filtered by `tool_filter`. A validator that panics is isolated, its
    /// outcome is recorded as an error, and the chain continues. The chain
    /// stops at the first validator that returns a non-`allow` decision;
    /// that result becomes `final_result`. If every validator allows (or
    /// none apply), `final_result` is the engine's configured default.
    pub async fn validate(&self, ctx: &ValidationContext) -> AggregatedResult {
        let mut ordered: Vec<&NamedValidator> = self.validators.iter().collect();
        ordered.sort_by_key(|v| v.priority);

        let mut validator_results = Vec::new();
        let mut short_circuit = None;

        for named in ordered {
            if !named.applies_to(&ctx.tool_name) {
                continue;
            }

            let validator = Arc::clone(&named.validator);
            let ctx_owned = ctx.clone();
            let outcome = tokio::spawn(async move { validator.validate(&ctx_owned).await }).await;

            match outcome {
                Ok(result) => {
                    validator_results
                        .push((named.name.clone(), ValidatorOutcome::Result(result.clone())));
                    if !result.is_allow() {
                        short_circuit = Some(result);
                        break;
                    }
                }
                Err(join_err) => {
                    tracing::warn!(validator = %named.name, error = %join_err, "validator panicked, isolating");
                    validator_results
                        .push((named.name.clone(), ValidatorOutcome::Error(join_err.to_string())));
                }
            }
        }

        let final_result = match short_circuit {
            Some(result) => result,
            None => ValidationResult {
                decision: self.default_decision.decision,
                reason: Some("All validators passed".to_string()),
                metadata: self.default_decision.metadata.clone(),
            },
        };

        AggregatedResult {
            final_result,
            validator_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(tool_name: &str) -> ValidationContext {
        ValidationContext {
            tool_name: tool_name.to_string(),
            arguments: serde_json::json!({}),
            call_id: "call_1".to_string(),
            timestamp: Utc::now(),
            call_history: Arc::from(Vec::new().into_boxed_slice()),
            custom: None,
        }
    }

    fn always(decision: Decision) -> Arc<dyn Validator> {
        Arc::new(move |_: &ValidationContext| ValidationResult {
            decision,
            reason: None,
            metadata: None,
        })
    }

    #[tokio::test]
    async fn empty_chain_returns_default() {
        let engine = ValidationEngine::new(ValidationResult::allow());
        let result = engine.validate(&ctx("pay")).await;
        assert!(result.final_result.is_allow());
        assert_eq!(result.final_result.reason.as_deref(), Some("All validators passed"));
        assert!(result.validator_results.is_empty());
    }

    #[tokio::test]
    async fn all_allow_overrides_individual_reasons_with_default() {
        let mut engine = ValidationEngine::new(ValidationResult::allow());
        engine.add_validator(NamedValidator::new(
            "a",
            10,
            Arc::new(|_: &ValidationContext| ValidationResult {
                decision: Decision::Allow,
                reason: Some("validator a's own reason".to_string()),
                metadata: None,
            }),
        ));

        let result = engine.validate(&ctx("pay")).await;
        assert!(result.final_result.is_allow());
        assert_eq!(result.final_result.reason.as_deref(), Some("All validators passed"));
        assert_eq!(result.validator_results.len(), 1);
    }

    #[tokio::test]
    async fn short_circuits_at_first_deny() {
        let mut engine = ValidationEngine::new(ValidationResult::allow());
        engine.add_validator(NamedValidator::new("a", 10, always(Decision::Allow)));
        engine.add_validator(NamedValidator::new("b", 20, always(Decision::Deny)));
        engine.add_validator(NamedValidator::new("c", 30, always(Decision::Allow)));

        let result = engine.validate(&ctx("pay")).await;
        assert_eq!(result.final_result.decision, Decision::Deny);
        assert_eq!(result.validator_results.len(), 2);
        assert_eq!(result.validator_results[0].0, "a");
        assert_eq!(result.validator_results[1].0, "b");
    }

    #[tokio::test]
    async fn priority_then_insertion_order_is_respected() {
        let mut engine = ValidationEngine::new(ValidationResult::allow());
        engine.add_validator(NamedValidator::new("second", 5, always(Decision::Allow)));
        engine.add_validator(NamedValidator::new("first", 1, always(Decision::Allow)));
        engine.add_validator(NamedValidator::new("third-tied", 5, always(Decision::Allow)));

        let result = engine.validate(&ctx("pay")).await;
        let names: Vec<_> = result
            .validator_results
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second", "third-tied"]);
    }

    #[tokio::test]
    async fn tool_filter_excludes_non_matching_tools() {
        let mut engine = ValidationEngine::new(ValidationResult::allow());
        let mut filter = HashSet::new();
        filter.insert("transfer".to_string());
        engine.add_validator(
            NamedValidator::new("only-transfer", 10, always(Decision::Deny))
                .with_tool_filter(filter),
        );

        let result = engine.validate(&ctx("read_file")).await;
        assert!(result.final_result.is_allow());
        assert!(result.validator_results.is_empty());
    }

    #[tokio::test]
    async fn panicking_validator_is_isolated_and_chain_continues() {
        let mut engine = ValidationEngine::new(ValidationResult::allow());
        engine.add_validator(NamedValidator::new(
            "panics",
            10,
            Arc::new(|_: &ValidationContext| -> ValidationResult { panic!("boom") }),
        ));
        engine.add_validator(NamedValidator::new("denies", 20, always(Decision::Deny)));

        let result = engine.validate(&ctx("pay")).await;
        assert_eq!(result.final_result.decision, Decision::Deny);
        assert_eq!(result.validator_results.len(), 2);
        assert!(matches!(result.validator_results[0].1, ValidatorOutcome::Error(_)));
    }
}
