//! The Cloud client (C4): stateless HTTP adapter, approval polling, and its
//! wire types.

mod client;
mod types;

pub mod fake;

pub use client::{CloudClient, HttpCloudClient, VetoCloudConfig, DEFAULT_BASE_URL};
pub use types::{
    ApiContext, ApprovalData, ApprovalPollOptions, ApprovalStatus, Decision, DecisionLogRequest,
    FailedConstraint, ToolParameter, ToolRegistration, ToolRegistrationResponse,
    ValidationResponse,
};
