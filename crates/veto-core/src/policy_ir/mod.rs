//! Policy IR v1 schema validation (C3).

mod loader;
mod schema;
mod validator;

pub use loader::parse_and_validate;
pub use schema::policy_ir_v1_schema;
pub use validator::{validate_policy_ir, PolicySchemaError, PolicyValidationError};
