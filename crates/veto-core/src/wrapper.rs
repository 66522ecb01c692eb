//! The tool wrapper (C9): adapts a heterogeneous tool object so the
//! interceptor runs on every invocation path, without mutating the original.
//! Grounded on `Veto.wrap_tool` in the reference `veto/core/veto.py`,
//! reduced per the design notes (§9) to a closed set of adapter
//! constructors instead of runtime duck-typing on attribute names.

use crate::error::ToolCallDeniedError;
use crate::interceptor::Interceptor;
use crate::tool::ToolCall;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// The single capability the wrapper needs from a tool: call it with a
/// JSON argument map and get a JSON result back. Implemented by a small
/// closed set of adapters below rather than discovered reflectively per
/// call, which is the idiomatic Rust rendering of the source's duck-typed
/// `func`/`ainvoke`/`invoke`/`handler`/`run`/`execute`/`call`/`_call`
/// dispatch. Callers pick the right adapter once, at wrap time.
#[async_trait]
pub trait WrappableTool: Send + Sync {
    async fn call(&self, args: Value) -> anyhow::Result<Value>;
}

type BoxedAsyncFn =
    dyn Fn(Value) -> futures_core_compat::BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// Wraps a plain async closure taking the full argument map and returning a
/// JSON value, the Rust equivalent of the source's `func`/`invoke`/`call`
/// duck-typed dispatch, where the caller already knows their tool's calling
/// convention and supplies the matching closure once.
pub struct FnToolAdapter {
    func: Arc<BoxedAsyncFn>,
}

impl FnToolAdapter {
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            func: Arc::new(move |args| Box::pin(func(args))),
        }
    }
}

#[async_trait]
impl WrappableTool for FnToolAdapter {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        (self.func)(args).await
    }
}

/// Normalizes LangGraph-style `ainvoke` input, which nests the real
/// arguments under `{name, args, ...}` instead of passing them directly,
/// before delegating to an inner adapter. Mirrors `wrapped_ainvoke` in the
/// source.
pub struct AinvokeToolAdapter<T: WrappableTool> {
    inner: T,
}

impl<T: WrappableTool> AinvokeToolAdapter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: WrappableTool + Send + Sync> WrappableTool for AinvokeToolAdapter<T> {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let extracted = args.get("args").cloned().unwrap_or(args);
        self.inner.call(extracted).await
    }
}

/// A tool substituted for the original: every invocation runs through the
/// interceptor first. The original adapter is moved in at construction and
/// never mutated, so there is no "original object" left to accidentally leak
/// an un-intercepted call path, which is the non-invasive property the
/// source achieves via a shallow attribute copy.
pub struct WrappedTool<T: WrappableTool> {
    name: String,
    inner: T,
    interceptor: Arc<Interceptor>,
}

impl<T: WrappableTool> WrappedTool<T> {
    pub fn new(name: impl Into<String>, inner: T, interceptor: Arc<Interceptor>) -> Self {
        Self {
            name: name.into(),
            inner,
            interceptor,
        }
    }

    /// Runs one invocation: generates a fresh call id, builds the
    /// [`ToolCall`], intercepts it, and either raises
    /// [`ToolCallDeniedError`] (the only control-flow error a denial
    /// surfaces as) or calls the wrapped tool with the (possibly rewritten)
    /// final arguments. A failure of the *inner* tool itself is distinct
    /// from a denial and propagates as-is, wrapped in [`WrapperError::Execution`].
    pub async fn invoke(&self, arguments: Value) -> Result<Value, WrapperError> {
        let call = ToolCall::new(self.name.clone(), arguments);
        let result = self.interceptor.intercept(call).await;

        if !result.allowed {
            return Err(WrapperError::Denied(ToolCallDeniedError {
                tool_name: result.original_call.name.clone(),
                call_id: result.original_call.id.clone(),
                validation_result: result.validation_result,
            }));
        }

        let args = result
            .final_arguments
            .unwrap_or(result.original_call.arguments);

        self.inner.call(args).await.map_err(WrapperError::Execution)
    }
}

/// Everything [`WrappedTool::invoke`] can fail with: a policy denial (the
/// only control-flow error the source's `wrap_tool` raises) or a failure of
/// the wrapped tool's own execution, which is the tool's business, not the
/// interceptor's.
#[derive(Debug, thiserror::Error)]
pub enum WrapperError {
    #[error(transparent)]
    Denied(#[from] ToolCallDeniedError),
    #[error("tool execution failed: {0}")]
    Execution(#[source] anyhow::Error),
}

/// A minimal, dependency-free `Box<dyn Future>` alias so [`FnToolAdapter`]
/// does not need to pull in the `futures` crate for one type alias.
mod futures_core_compat {
    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}
