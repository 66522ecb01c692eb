//! The Policy IR v1 JSON Schema document (C3).
//!
//! This is the compatibility surface between language implementations: the
//! document itself, not the code that walks it, defines what is a valid
//! policy. Keep it in lockstep with the schema the Cloud service and other
//! SDKs validate against. Do not hand-tune field-by-field checks elsewhere
//! instead of editing this document.

use serde_json::{json, Value};
use std::sync::OnceLock;

/// Returns the embedded Policy IR v1 schema (JSON Schema Draft 2020-12).
pub fn policy_ir_v1_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "$id": "https://veto.dev/schemas/policy-ir-v1.json",
            "title": "Veto Policy IR v1",
            "type": "object",
            "required": ["version", "rules"],
            "additionalProperties": false,
            "properties": {
                "version": {
                    "const": "1.0"
                },
                "rules": {
                    "type": "array",
                    "items": { "$ref": "#/$defs/rule" }
                }
            },
            "$defs": {
                "rule": {
                    "type": "object",
                    "required": ["id", "name", "action"],
                    "additionalProperties": false,
                    "properties": {
                        "id": {
                            "type": "string",
                            "minLength": 1
                        },
                        "name": {
                            "type": "string"
                        },
                        "description": {
                            "type": "string"
                        },
                        "action": {
                            "enum": ["block", "allow", "require_approval", "log"]
                        },
                        "conditions": {
                            "type": "array",
                            "items": { "$ref": "#/$defs/condition" }
                        }
                    }
                },
                "condition": {
                    "type": "object",
                    "required": ["field", "operator", "value"],
                    "additionalProperties": false,
                    "properties": {
                        "field": {
                            "type": "string",
                            "minLength": 1
                        },
                        "operator": {
                            "enum": [
                                "equals",
                                "not_equals",
                                "contains",
                                "greater_than",
                                "less_than",
                                "in",
                                "not_in",
                                "matches"
                            ]
                        },
                        "value": true
                    }
                }
            }
        })
    })
}
