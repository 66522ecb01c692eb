//! The deterministic constraint evaluator (C2): evaluates one argument map
//! against an ordered list of [`ArgumentConstraint`]s, entirely locally and
//! without model assistance.

use super::regex_safety::{is_safe_pattern, MAX_PATTERN_LENGTH};
use super::types::{
    ArgumentConstraint, ConstraintCheckResult, EntryStatus, LocalDecision, LocalValidationResult,
    ValidationEntry,
};
use serde_json::Value;
use std::time::Instant;

/// Evaluates `args` against `constraints` in order, stopping at the first
/// failing constraint. An empty constraint list always allows.
pub fn validate_deterministic(
    _tool_name: &str,
    args: &serde_json::Map<String, Value>,
    constraints: &[ArgumentConstraint],
) -> LocalValidationResult {
    let start = Instant::now();
    let mut validations = Vec::new();

    for constraint in constraints {
        if !constraint.enabled {
            continue;
        }

        let key_exists = args.contains_key(&constraint.argument_name);
        let value = args.get(&constraint.argument_name);

        let is_null_or_absent = match value {
            None => true,
            Some(Value::Null) => true,
            Some(_) => false,
        };

        if is_null_or_absent {
            if constraint.required == Some(true) && !key_exists {
                return LocalValidationResult {
                    decision: LocalDecision::Deny,
                    reason: Some(format!(
                        "Required argument '{}' is missing",
                        constraint.argument_name
                    )),
                    failed_argument: Some(constraint.argument_name.clone()),
                    validations,
                    latency_ms: elapsed_ms(start),
                };
            }
            if constraint.not_null == Some(true) && key_exists {
                return LocalValidationResult {
                    decision: LocalDecision::Deny,
                    reason: Some(format!(
                        "Argument '{}' cannot be null",
                        constraint.argument_name
                    )),
                    failed_argument: Some(constraint.argument_name.clone()),
                    validations,
                    latency_ms: elapsed_ms(start),
                };
            }
            continue;
        }

        let value = value.expect("checked non-null above");
        let result = check_constraints(value, constraint);

        if !result.passed {
            let inner = result.reason.clone().unwrap_or_default();
            return LocalValidationResult {
                decision: LocalDecision::Deny,
                reason: Some(format!(
                    "Argument '{}' failed: {}",
                    constraint.argument_name, inner
                )),
                failed_argument: Some(constraint.argument_name.clone()),
                validations: vec![ValidationEntry {
                    argument: constraint.argument_name.clone(),
                    status: EntryStatus::Fail,
                    reason: result.reason,
                }],
                latency_ms: elapsed_ms(start),
            };
        }

        validations.push(ValidationEntry {
            argument: constraint.argument_name.clone(),
            status: EntryStatus::Pass,
            reason: result.reason,
        });
    }

    LocalValidationResult {
        decision: LocalDecision::Allow,
        reason: None,
        failed_argument: None,
        validations,
        latency_ms: elapsed_ms(start),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn check_constraints(value: &Value, constraint: &ArgumentConstraint) -> ConstraintCheckResult {
    match value {
        Value::Number(n) => check_number_constraints(n, constraint),
        Value::String(s) => check_string_constraints(s, constraint),
        Value::Array(items) => check_array_constraints(items, constraint),
        // Booleans and objects: no bound in ArgumentConstraint applies to them.
        Value::Bool(_) | Value::Object(_) | Value::Null => ConstraintCheckResult::pass(),
    }
}

fn check_number_constraints(
    n: &serde_json::Number,
    constraint: &ArgumentConstraint,
) -> ConstraintCheckResult {
    // serde_json::Number never holds NaN/Inf when parsed from JSON text, but
    // callers may construct one in-process (e.g. `Value::from(f64::NAN)` is
    // actually rejected by serde_json at construction time, returning Null
    // instead). `as_f64` is the defensive path that keeps this check
    // meaningful for any future `Value` construction route.
    let value = match n.as_f64() {
        Some(v) => v,
        None => return ConstraintCheckResult::pass(),
    };

    if value.is_nan() {
        return ConstraintCheckResult::fail("value is NaN");
    }
    if value.is_infinite() {
        return ConstraintCheckResult::fail(format!("value {value} is not finite"));
    }

    if let Some(bound) = constraint.greater_than {
        if value <= bound {
            return ConstraintCheckResult::fail(format!(
                "value {value} must be greater than {bound}"
            ));
        }
    }
    if let Some(bound) = constraint.less_than {
        if value >= bound {
            return ConstraintCheckResult::fail(format!("value {value} must be less than {bound}"));
        }
    }
    if let Some(bound) = constraint.greater_than_or_equal {
        if value < bound {
            return ConstraintCheckResult::fail(format!("value {value} must be >= {bound}"));
        }
    }
    if let Some(bound) = constraint.less_than_or_equal {
        if value > bound {
            return ConstraintCheckResult::fail(format!("value {value} must be <= {bound}"));
        }
    }
    if let Some(bound) = constraint.minimum {
        if value < bound {
            return ConstraintCheckResult::fail(format!("value {value} must be >= {bound}"));
        }
    }
    if let Some(bound) = constraint.maximum {
        if value > bound {
            return ConstraintCheckResult::fail(format!("value {value} must be <= {bound}"));
        }
    }

    ConstraintCheckResult::pass()
}

fn check_string_constraints(value: &str, constraint: &ArgumentConstraint) -> ConstraintCheckResult {
    let len = value.chars().count();

    if let Some(min) = constraint.min_length {
        if len < min {
            return ConstraintCheckResult::fail(format!(
                "length {len} is less than minimum {min}"
            ));
        }
    }
    if let Some(max) = constraint.max_length {
        if len > max {
            return ConstraintCheckResult::fail(format!("length {len} exceeds maximum {max}"));
        }
    }

    if let Some(pattern) = &constraint.regex {
        if pattern.chars().count() > MAX_PATTERN_LENGTH {
            return ConstraintCheckResult::fail(format!(
                "regex pattern too long ({} chars, max {})",
                pattern.chars().count(),
                MAX_PATTERN_LENGTH
            ));
        }
        if !is_safe_pattern(pattern) {
            return ConstraintCheckResult::fail(format!(
                "regex pattern is potentially unsafe (ReDoS risk): {pattern}"
            ));
        }
        match regex::Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(value) {
                    return ConstraintCheckResult::fail(format!(
                        "value does not match pattern {pattern}"
                    ));
                }
            }
            Err(_) => {
                return ConstraintCheckResult::fail(format!("invalid regex pattern: {pattern}"));
            }
        }
    }

    if let Some(allowed) = &constraint.enum_values {
        if !allowed.iter().any(|a| a == value) {
            return ConstraintCheckResult::fail(format!(
                "value \"{value}\" is not in allowed values: {}",
                allowed.join(", ")
            ));
        }
    }

    ConstraintCheckResult::pass()
}

fn check_array_constraints(items: &[Value], constraint: &ArgumentConstraint) -> ConstraintCheckResult {
    if let Some(min) = constraint.min_items {
        if items.len() < min {
            return ConstraintCheckResult::fail(format!(
                "array has {} items, minimum is {min}",
                items.len()
            ));
        }
    }
    if let Some(max) = constraint.max_items {
        if items.len() > max {
            return ConstraintCheckResult::fail(format!(
                "array has {} items, maximum is {max}",
                items.len()
            ));
        }
    }
    ConstraintCheckResult::pass()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> serde_json::Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_constraints_allow() {
        let result = validate_deterministic("tool", &args(json!({})), &[]);
        assert_eq!(result.decision, LocalDecision::Allow);
    }

    #[test]
    fn scenario_deterministic_allow() {
        let constraints = vec![ArgumentConstraint {
            minimum: Some(0.0),
            maximum: Some(1000.0),
            ..ArgumentConstraint::new("amount")
        }];
        let result = validate_deterministic("pay", &args(json!({"amount": 500})), &constraints);
        assert_eq!(result.decision, LocalDecision::Allow);
        assert_eq!(result.validations.len(), 1);
        assert_eq!(result.validations[0].status, EntryStatus::Pass);
    }

    #[test]
    fn scenario_deny_via_greater_than() {
        let constraints = vec![ArgumentConstraint {
            greater_than: Some(10.0),
            ..ArgumentConstraint::new("val")
        }];
        let result = validate_deterministic("tool", &args(json!({"val": 10})), &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);
        assert_eq!(result.failed_argument.as_deref(), Some("val"));
        assert!(result.reason.unwrap().contains("must be greater than 10"));
    }

    #[test]
    fn greater_than_or_equal_allows_boundary() {
        let constraints = vec![ArgumentConstraint {
            greater_than_or_equal: Some(10.0),
            ..ArgumentConstraint::new("val")
        }];
        let result = validate_deterministic("tool", &args(json!({"val": 10})), &constraints);
        assert_eq!(result.decision, LocalDecision::Allow);

        let result = validate_deterministic("tool", &args(json!({"val": 11})), &constraints);
        assert_eq!(result.decision, LocalDecision::Allow);
    }

    #[test]
    fn scenario_redos_rejection() {
        let constraints = vec![ArgumentConstraint {
            regex: Some("(a+)+".to_string()),
            ..ArgumentConstraint::new("val")
        }];
        let result = validate_deterministic("tool", &args(json!({"val": "anything"})), &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);
        assert!(result.reason.unwrap().contains("unsafe"));
    }

    #[test]
    fn nan_and_infinite_always_deny() {
        let constraints = vec![ArgumentConstraint {
            minimum: Some(0.0),
            ..ArgumentConstraint::new("val")
        }];

        // `serde_json::Number::from_f64` returns `None` for NaN, so this
        // exercises the infinite-value path instead; NaN is unreachable
        // through this constructor but `check_number_constraints` still
        // guards it for values built some other way.
        let mut map = serde_json::Map::new();
        map.insert(
            "val".to_string(),
            Value::Number(serde_json::Number::from_f64(f64::INFINITY).unwrap()),
        );
        let result = validate_deterministic("tool", &map, &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);
    }

    #[test]
    fn required_and_not_null_semantics() {
        let constraints = vec![ArgumentConstraint {
            required: Some(true),
            not_null: Some(true),
            ..ArgumentConstraint::new("val")
        }];

        let result = validate_deterministic("tool", &args(json!({})), &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);
        assert!(result.reason.unwrap().contains("missing"));

        let result = validate_deterministic("tool", &args(json!({"val": null})), &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);
        assert!(result.reason.unwrap().contains("cannot be null"));

        for falsy in [json!(0), json!(""), json!(false)] {
            let mut map = serde_json::Map::new();
            map.insert("val".to_string(), falsy);
            let result = validate_deterministic("tool", &map, &constraints);
            assert_eq!(result.decision, LocalDecision::Allow);
        }
    }

    #[test]
    fn disabled_constraint_produces_no_entry() {
        let constraints = vec![ArgumentConstraint {
            enabled: false,
            minimum: Some(100.0),
            ..ArgumentConstraint::new("val")
        }];
        let result = validate_deterministic("tool", &args(json!({"val": 1})), &constraints);
        assert_eq!(result.decision, LocalDecision::Allow);
        assert!(result.validations.is_empty());
    }

    #[test]
    fn failing_constraint_yields_exactly_one_entry() {
        let constraints = vec![
            ArgumentConstraint {
                minimum: Some(0.0),
                ..ArgumentConstraint::new("a")
            },
            ArgumentConstraint {
                greater_than: Some(100.0),
                ..ArgumentConstraint::new("b")
            },
        ];
        let result =
            validate_deterministic("tool", &args(json!({"a": 5, "b": 1})), &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);
        assert_eq!(result.failed_argument.as_deref(), Some("b"));
        assert_eq!(result.validations.len(), 1);
        assert_eq!(result.validations[0].status, EntryStatus::Fail);
    }

    #[test]
    fn array_bounds() {
        let constraints = vec![ArgumentConstraint {
            min_items: Some(1),
            max_items: Some(2),
            ..ArgumentConstraint::new("items")
        }];
        let result = validate_deterministic("tool", &args(json!({"items": []})), &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);

        let result =
            validate_deterministic("tool", &args(json!({"items": [1, 2, 3]})), &constraints);
        assert_eq!(result.decision, LocalDecision::Deny);

        let result = validate_deterministic("tool", &args(json!({"items": [1]})), &constraints);
        assert_eq!(result.decision, LocalDecision::Allow);
    }

    #[test]
    fn boolean_values_pass_through_numeric_bounds() {
        let constraints = vec![ArgumentConstraint {
            minimum: Some(10.0),
            ..ArgumentConstraint::new("flag")
        }];
        let result = validate_deterministic("tool", &args(json!({"flag": true})), &constraints);
        assert_eq!(result.decision, LocalDecision::Allow);
    }

    #[test]
    fn regex_must_search_not_fully_match() {
        let constraints = vec![ArgumentConstraint {
            regex: Some("bar".to_string()),
            ..ArgumentConstraint::new("val")
        }];
        let result =
            validate_deterministic("tool", &args(json!({"val": "foobarbaz"})), &constraints);
        assert_eq!(result.decision, LocalDecision::Allow);
    }
}
