//! Data types for the deterministic constraint evaluator (C2).

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A single argument's constraint set. At most one kind of per-type bound
/// (numeric / string / array / enum / presence) is meaningful for any given
/// value; bounds that don't apply to the value's runtime shape are ignored,
/// never promoted to a denial.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArgumentConstraint {
    pub argument_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,

    // Numeric bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than_or_equal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than_or_equal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    // String bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    // Array bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    // Presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl ArgumentConstraint {
    pub fn new(argument_name: impl Into<String>) -> Self {
        Self {
            argument_name: argument_name.into(),
            enabled: true,
            ..Default::default()
        }
    }
}

/// Operating mode of a [`DeterministicPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Deterministic,
    Llm,
}

/// A per-tool list of argument constraints evaluated locally, without model
/// assistance. Fetched from Cloud and held by [`crate::cache::PolicyCache`].
#[derive(Debug, Clone)]
pub struct DeterministicPolicy {
    pub tool_name: String,
    pub mode: PolicyMode,
    pub constraints: Vec<ArgumentConstraint>,
    pub has_session_constraints: bool,
    pub has_rate_limits: bool,
    pub version: u32,
    pub fetched_at: Instant,
}

#[derive(Debug, Clone)]
pub(crate) struct ConstraintCheckResult {
    pub passed: bool,
    pub reason: Option<String>,
}

impl ConstraintCheckResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// The decision reached by the deterministic evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalDecision {
    Allow,
    Deny,
}

/// A single constraint's pass/fail outcome, recorded during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub argument: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pass,
    Fail,
}

/// Result of [`crate::deterministic::validator::validate_deterministic`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalValidationResult {
    pub decision: LocalDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_argument: Option<String>,
    pub validations: Vec<ValidationEntry>,
    pub latency_ms: f64,
}
