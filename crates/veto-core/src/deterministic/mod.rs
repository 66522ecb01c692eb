//! Deterministic, local constraint evaluation (C2), with its ReDoS-safe
//! regex pre-filter (C1).

mod regex_safety;
mod types;
mod validator;

pub use regex_safety::{is_safe_pattern, MAX_PATTERN_LENGTH};
pub use types::{
    ArgumentConstraint, DeterministicPolicy, EntryStatus, LocalDecision, LocalValidationResult,
    PolicyMode, ValidationEntry,
};
pub use validator::validate_deterministic;
