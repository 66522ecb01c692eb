//! `veto-core`: the guardrail SDK's hard core, a per-call validation
//! pipeline sitting between an AI agent and the tools it invokes.
//!
//! Every tool call is intercepted ([`interceptor`]), subjected to an
//! ordered chain of validators ([`engine`]) that may consult a
//! stale-while-revalidate policy cache ([`cache`]) backed by a deterministic
//! local constraint evaluator ([`deterministic`]), and is either allowed,
//! denied, or suspended pending human approval through Cloud
//! ([`cloud`]). The [`veto`] module is the embeddable façade that wires
//! these together; [`wrapper`] adapts heterogeneous tool objects so the
//! interceptor runs on every invocation path.
//!
//! This crate does not install a global `tracing` subscriber. It only
//! emits events. The embedding process (a binary, not this library) owns
//! subscriber initialization, honoring `VETO_LOG_LEVEL` if it chooses to.

pub mod cache;
pub mod cloud;
pub mod deterministic;
pub mod engine;
pub mod error;
pub mod history;
pub mod interceptor;
pub mod policy_ir;
pub mod tool;
pub mod veto;
pub mod wrapper;

pub use crate::engine::{
    AggregatedResult, Decision, NamedValidator, ValidationContext, ValidationResult, Validator,
};
pub use crate::error::{ApprovalTimeoutError, ToolCallDeniedError, VetoError};
pub use crate::history::{HistoryStats, HistoryTracker, ToolCallHistoryEntry};
pub use crate::interceptor::{Interceptor, InterceptionResult, InterceptorMode};
pub use crate::tool::ToolCall;
pub use crate::veto::{Veto, VetoOptions};
pub use crate::wrapper::{AinvokeToolAdapter, FnToolAdapter, WrappableTool, WrappedTool, WrapperError};
