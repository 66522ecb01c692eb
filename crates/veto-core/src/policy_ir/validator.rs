//! Validates parsed policy documents against the embedded Policy IR v1
//! schema (C3). Ported from `rules/schema_validator.py`: compile the schema
//! once, collect every violation in one pass, never silently pass.

use super::schema::policy_ir_v1_schema;
use serde_json::Value;
use std::sync::OnceLock;

/// One schema violation, located by a slash-delimited JSON-pointer-style
/// path. Root-level violations report `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyValidationError {
    pub path: String,
    pub message: String,
    pub keyword: String,
}

/// Raised when a policy document fails schema validation. Always carries the
/// complete list of violations found in a single pass, never just the first.
#[derive(Debug, thiserror::Error)]
#[error("invalid policy document:\n{}", format_errors(errors))]
pub struct PolicySchemaError {
    pub errors: Vec<PolicyValidationError>,
}

fn format_errors(errors: &[PolicyValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn compiled_schema() -> &'static jsonschema::JSONSchema {
    static COMPILED: OnceLock<jsonschema::JSONSchema> = OnceLock::new();
    COMPILED.get_or_init(|| {
        jsonschema::JSONSchema::compile(policy_ir_v1_schema())
            .expect("embedded Policy IR v1 schema must itself be a valid JSON Schema")
    })
}

/// Validates `data` against the Policy IR v1 schema.
///
/// Returns every violation found in a single pass. Malformed root values
/// (`null`, scalars, arrays, objects missing required top-level fields) are
/// always rejected; there is no implicit pass-through for non-object input.
pub fn validate_policy_ir(data: &Value) -> Result<(), PolicySchemaError> {
    let schema = compiled_schema();
    let raw_errors: Vec<_> = schema
        .validate(data)
        .err()
        .map(|it| it.collect::<Vec<_>>())
        .unwrap_or_default();

    if raw_errors.is_empty() {
        return Ok(());
    }

    let errors = raw_errors
        .into_iter()
        .map(|e| PolicyValidationError {
            path: format_path(&e.instance_path),
            message: e.to_string(),
            keyword: format_keyword(&e.schema_path),
        })
        .collect();

    Err(PolicySchemaError { errors })
}

fn format_path(pointer: &jsonschema::paths::JSONPointer) -> String {
    let rendered = pointer.to_string();
    if rendered.is_empty() {
        "/".to_string()
    } else {
        rendered
    }
}

fn format_keyword(schema_path: &jsonschema::paths::JSONPointer) -> String {
    schema_path
        .to_string()
        .rsplit('/')
        .find(|segment| !segment.is_empty() && segment.parse::<usize>().is_err())
        .unwrap_or("schema")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors_for(data: Value) -> Vec<PolicyValidationError> {
        validate_policy_ir(&data).unwrap_err().errors
    }

    #[test]
    fn valid_minimal_document_passes() {
        let doc = json!({
            "version": "1.0",
            "rules": [
                { "id": "r1", "name": "block writes", "action": "block" }
            ]
        });
        assert!(validate_policy_ir(&doc).is_ok());
    }

    #[test]
    fn valid_full_document_passes() {
        let doc = json!({
            "version": "1.0",
            "rules": [
                {
                    "id": "r1",
                    "name": "require approval on large transfers",
                    "description": "humans review anything over the threshold",
                    "action": "require_approval",
                    "conditions": [
                        { "field": "amount", "operator": "greater_than", "value": 1000 }
                    ]
                }
            ]
        });
        assert!(validate_policy_ir(&doc).is_ok());
    }

    #[test]
    fn missing_version_fails() {
        let errors = errors_for(json!({ "rules": [] }));
        assert!(!errors.is_empty());
    }

    #[test]
    fn wrong_version_fails() {
        let errors = errors_for(json!({ "version": "2.0", "rules": [] }));
        assert!(!errors.is_empty());
    }

    #[test]
    fn missing_rules_fails() {
        let errors = errors_for(json!({ "version": "1.0" }));
        assert!(!errors.is_empty());
    }

    #[test]
    fn extra_top_level_field_fails() {
        let errors = errors_for(json!({ "version": "1.0", "rules": [], "unknown": true }));
        assert!(!errors.is_empty());
    }

    #[test]
    fn bad_action_fails() {
        let errors = errors_for(json!({
            "version": "1.0",
            "rules": [{ "id": "r1", "name": "n", "action": "nuke" }]
        }));
        assert!(!errors.is_empty());
    }

    #[test]
    fn bad_operator_fails_with_nested_condition_path() {
        let errors = errors_for(json!({
            "version": "1.0",
            "rules": [{
                "id": "r1",
                "name": "n",
                "action": "block",
                "conditions": [{ "field": "x", "operator": "frobnicate", "value": 1 }]
            }]
        }));
        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.path.contains("rules/0/conditions/0")));
    }

    #[test]
    fn rule_missing_id_fails() {
        let errors = errors_for(json!({
            "version": "1.0",
            "rules": [{ "name": "n", "action": "block" }]
        }));
        assert!(!errors.is_empty());
    }

    #[test]
    fn rule_with_only_name_reports_at_least_two_errors() {
        let errors = errors_for(json!({
            "version": "1.0",
            "rules": [{ "name": "n" }]
        }));
        assert!(errors.len() >= 2);
        assert!(errors.iter().all(|e| e.path.contains("rules/0")));
    }

    #[test]
    fn reports_all_errors_for_empty_object() {
        let errors = errors_for(json!({}));
        assert!(errors.len() >= 2);
    }

    #[test]
    fn paths_include_parent_property_names_not_bare_indices() {
        let errors = errors_for(json!({
            "version": "1.0",
            "rules": [{ "name": "n" }]
        }));
        for e in &errors {
            assert!(e.path == "/" || !e.path.trim_start_matches('/').starts_with(char::is_numeric));
        }
    }

    #[test]
    fn root_level_errors_use_slash() {
        let errors = errors_for(json!({}));
        assert!(errors.iter().any(|e| e.path == "/"));
    }

    #[test]
    fn never_silently_passes_malformed_non_object_input() {
        for bad in [
            Value::Null,
            json!("string"),
            json!(123),
            json!([]),
            json!({"version": "1.0"}),
            json!({"rules": []}),
            json!({"version": "2.0", "rules": []}),
        ] {
            assert!(validate_policy_ir(&bad).is_err(), "expected error for {bad:?}");
        }
    }

    #[test]
    fn error_structure_is_always_complete() {
        let errors = errors_for(json!({}));
        for e in &errors {
            assert!(!e.path.is_empty());
            assert!(!e.message.is_empty());
            assert!(!e.keyword.is_empty());
        }
    }
}
