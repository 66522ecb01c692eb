//! Parses a Policy IR v1 document from its wire representation (YAML or
//! JSON, YAML is accepted because YAML is a superset of JSON and the
//! reference SDK treats policy documents as YAML-first) and validates it
//! against the embedded schema in one step. Grounded on
//! `assay-core::config::load_config`'s `serde_yaml::Deserializer` pattern.

use super::validator::{validate_policy_ir, PolicySchemaError};
use serde_json::Value;

/// A `PolicySchemaError` carrying a single synthetic parse-failure entry, or
/// the schema's own violation list when parsing succeeds but validation
/// does not.
pub fn parse_and_validate(source: &str) -> Result<Value, PolicySchemaError> {
    let value: Value = serde_yaml::from_str(source).map_err(|e| PolicySchemaError {
        errors: vec![super::validator::PolicyValidationError {
            path: "/".to_string(),
            message: format!("failed to parse policy document: {e}"),
            keyword: "parse".to_string(),
        }],
    })?;

    validate_policy_ir(&value)?;
    Ok(value)
}
