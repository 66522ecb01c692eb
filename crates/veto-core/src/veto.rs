//! The façade (C10): lifecycle, configuration resolution, and wiring of the
//! other nine components into one embeddable `Veto` instance. Grounded on
//! `Veto.__init__`/`Veto.init` in the reference `veto/core/veto.py`, styled
//! on this codebase's `ServerConfig::from_env` precedence chain
//! (explicit option → environment variable → static default).

use crate::cache::PolicyCache;
use crate::cloud::{CloudClient, HttpCloudClient, VetoCloudConfig};
use crate::deterministic::validate_deterministic;
use crate::engine::{
    Decision, NamedValidator, ValidationContext, ValidationEngine, ValidationResult, Validator,
};
use crate::history::{HistoryStats, HistoryTracker};
use crate::interceptor::{ApprovalRequiredHook, Interceptor, InterceptorMode};
use crate::wrapper::{WrappableTool, WrappedTool};
use async_trait::async_trait;
use std::env;
use std::sync::Arc;

/// Priority of the built-in Cloud-delegating validator seeded by
/// [`Veto::init`]. Low enough that most user validators (default priority
/// 100) run after it, matching the source's ordering.
pub const CLOUD_VALIDATOR_PRIORITY: i32 = 50;
pub const CLOUD_VALIDATOR_NAME: &str = "veto-cloud-validator";

/// Resolved configuration for one [`Veto`] instance. Every field resolves,
/// in order: the value passed to [`VetoOptions`] → the matching environment
/// variable → a static default.
#[derive(Debug, Clone)]
pub struct VetoOptions {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub log_level: Option<String>,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub mode: InterceptorMode,
    pub timeout: std::time::Duration,
    pub retries: u32,
    pub retry_delay: std::time::Duration,
    pub history_capacity: usize,
}

impl Default for VetoOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            log_level: None,
            session_id: None,
            agent_id: None,
            mode: InterceptorMode::Strict,
            timeout: std::time::Duration::from_secs(30),
            retries: 2,
            retry_delay: std::time::Duration::from_secs(1),
            history_capacity: HistoryTracker::DEFAULT_CAPACITY,
        }
    }
}

struct ResolvedConfig {
    api_key: Option<String>,
    api_url: String,
    log_level: String,
    session_id: Option<String>,
    agent_id: Option<String>,
}

fn resolve_env(explicit: Option<String>, var: &str) -> Option<String> {
    explicit.or_else(|| env::var(var).ok())
}

fn resolve(options: &VetoOptions) -> ResolvedConfig {
    let api_key = resolve_env(options.api_key.clone(), "VETO_API_KEY");
    if api_key.is_none() {
        tracing::warn!("no VETO_API_KEY configured; requests to Cloud will be unauthenticated");
    }

    ResolvedConfig {
        api_key,
        api_url: resolve_env(options.api_url.clone(), "VETO_API_URL")
            .unwrap_or_else(|| crate::cloud::DEFAULT_BASE_URL.to_string()),
        log_level: resolve_log_level(resolve_env(options.log_level.clone(), "VETO_LOG_LEVEL")),
        session_id: resolve_env(options.session_id.clone(), "VETO_SESSION_ID"),
        agent_id: resolve_env(options.agent_id.clone(), "VETO_AGENT_ID"),
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["debug", "info", "warn", "error", "silent"];

/// Falls back to `"info"` for an absent or unrecognized log level, rather
/// than erroring. A typo'd `VETO_LOG_LEVEL` should degrade gracefully, not
/// crash SDK initialization.
fn resolve_log_level(candidate: Option<String>) -> String {
    match candidate {
        Some(level) if VALID_LOG_LEVELS.contains(&level.as_str()) => level,
        Some(level) => {
            tracing::warn!(level = %level, "unrecognized VETO_LOG_LEVEL, falling back to info");
            "info".to_string()
        }
        None => "info".to_string(),
    }
}

/// A validator that delegates to Cloud's `validate` endpoint, and, when
/// Cloud returns a deterministic policy's constraints instead of (or ahead
/// of) a verdict, consults the locally cached policy via
/// [`validate_deterministic`]. Seeded into every [`Veto`] instance as the
/// `veto-cloud-validator`.
struct CloudValidator {
    cloud_client: Arc<dyn CloudClient>,
    cache: Arc<PolicyCache>,
    session_id: Option<String>,
    agent_id: Option<String>,
}

#[async_trait]
impl Validator for CloudValidator {
    async fn validate(&self, ctx: &ValidationContext) -> ValidationResult {
        if let Some(policy) = self.cache.get(&ctx.tool_name).await {
            if policy.mode == crate::deterministic::PolicyMode::Deterministic {
                let args = match &ctx.arguments {
                    serde_json::Value::Object(map) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                let local = validate_deterministic(&ctx.tool_name, &args, &policy.constraints);
                return match local.decision {
                    crate::deterministic::LocalDecision::Allow => ValidationResult::allow(),
                    crate::deterministic::LocalDecision::Deny => ValidationResult {
                        decision: Decision::Deny,
                        reason: local.reason,
                        metadata: local
                            .failed_argument
                            .map(|arg| serde_json::json!({ "failed_argument": arg })),
                    },
                };
            }
        }

        let api_ctx = crate::cloud::ApiContext {
            call_id: Some(ctx.call_id.clone()),
            timestamp: Some(ctx.timestamp.to_rfc3339()),
            session_id: self.session_id.clone(),
            agent_id: self.agent_id.clone(),
            custom: ctx.custom.clone(),
        };
        let response = self
            .cloud_client
            .validate(&ctx.tool_name, &ctx.arguments, Some(&api_ctx))
            .await;

        let metadata = match (&response.metadata, &response.approval_id) {
            (Some(serde_json::Value::Object(m)), Some(id)) => {
                let mut m = m.clone();
                m.insert("approval_id".to_string(), serde_json::json!(id));
                Some(serde_json::Value::Object(m))
            }
            (Some(meta), None) => Some(meta.clone()),
            (None, Some(id)) => Some(serde_json::json!({ "approval_id": id })),
            (None, None) => None,
        };

        ValidationResult {
            decision: response.decision,
            reason: response.reason,
            metadata,
        }
    }
}

/// The embeddable guardrail SDK instance. Owns the validation engine, the
/// Cloud client, the policy cache, the history tracker, and the
/// interceptor built from them. Neither this type nor anything it owns is
/// a process-wide singleton: construct one per agent process (or per test).
pub struct Veto {
    interceptor: Arc<Interceptor>,
    history: Arc<HistoryTracker>,
    cloud_client: Arc<dyn CloudClient>,
    log_level: String,
}

impl Veto {
    /// Resolves `options`, builds the Cloud client, pre-seeds the
    /// validation engine with the built-in Cloud-delegating validator, and
    /// wires up the history tracker and interceptor.
    pub fn init(options: VetoOptions) -> anyhow::Result<Self> {
        Self::init_with_validators(options, Vec::new())
    }

    /// As [`Veto::init`], additionally appending `extra_validators` after
    /// the built-in `veto-cloud-validator`.
    pub fn init_with_validators(
        options: VetoOptions,
        extra_validators: Vec<NamedValidator>,
    ) -> anyhow::Result<Self> {
        let resolved = resolve(&options);

        let cloud_client: Arc<dyn CloudClient> = Arc::new(HttpCloudClient::new(VetoCloudConfig {
            api_key: resolved.api_key,
            base_url: resolved.api_url,
            timeout: options.timeout,
            retries: options.retries,
            retry_delay: options.retry_delay,
        })?);

        Ok(Self::build(
            options,
            resolved.session_id,
            resolved.agent_id,
            resolved.log_level,
            cloud_client,
            extra_validators,
            None,
        ))
    }

    /// Constructs a [`Veto`] around an already-built [`CloudClient`].
    /// The entry point tests and embedders use to substitute
    /// [`crate::cloud::fake::FakeCloudClient`] for the real HTTP
    /// implementation.
    pub fn with_cloud_client(
        options: VetoOptions,
        cloud_client: Arc<dyn CloudClient>,
        extra_validators: Vec<NamedValidator>,
    ) -> Self {
        let session_id = resolve_env(options.session_id.clone(), "VETO_SESSION_ID");
        let agent_id = resolve_env(options.agent_id.clone(), "VETO_AGENT_ID");
        let log_level = resolve_log_level(resolve_env(options.log_level.clone(), "VETO_LOG_LEVEL"));
        Self::build(
            options,
            session_id,
            agent_id,
            log_level,
            cloud_client,
            extra_validators,
            None,
        )
    }

    /// As [`Veto::with_cloud_client`], additionally installing `hook` to
    /// fire when a call's final decision is `require_approval`, before
    /// polling begins.
    pub fn with_cloud_client_and_hook(
        options: VetoOptions,
        cloud_client: Arc<dyn CloudClient>,
        extra_validators: Vec<NamedValidator>,
        hook: Arc<ApprovalRequiredHook>,
    ) -> Self {
        let session_id = resolve_env(options.session_id.clone(), "VETO_SESSION_ID");
        let agent_id = resolve_env(options.agent_id.clone(), "VETO_AGENT_ID");
        let log_level = resolve_log_level(resolve_env(options.log_level.clone(), "VETO_LOG_LEVEL"));
        Self::build(
            options,
            session_id,
            agent_id,
            log_level,
            cloud_client,
            extra_validators,
            Some(hook),
        )
    }

    fn build(
        options: VetoOptions,
        session_id: Option<String>,
        agent_id: Option<String>,
        log_level: String,
        cloud_client: Arc<dyn CloudClient>,
        extra_validators: Vec<NamedValidator>,
        approval_hook: Option<Arc<ApprovalRequiredHook>>,
    ) -> Self {
        let cache = Arc::new(PolicyCache::new(Arc::clone(&cloud_client)));

        let mut engine = ValidationEngine::new(ValidationResult {
            decision: Decision::Allow,
            reason: Some("All validators passed".to_string()),
            metadata: None,
        });
        engine.add_validator(NamedValidator::new(
            CLOUD_VALIDATOR_NAME,
            CLOUD_VALIDATOR_PRIORITY,
            Arc::new(CloudValidator {
                cloud_client: Arc::clone(&cloud_client),
                cache,
                session_id: session_id.clone(),
                agent_id: agent_id.clone(),
            }),
        ));
        for validator in extra_validators {
            engine.add_validator(validator);
        }

        let history = Arc::new(HistoryTracker::new(options.history_capacity));
        let mut interceptor_builder =
            Interceptor::new(engine, Arc::clone(&cloud_client), Arc::clone(&history))
                .with_mode(options.mode)
                .with_identity(session_id, agent_id);
        if let Some(hook) = approval_hook {
            interceptor_builder = interceptor_builder.with_approval_hook(hook);
        }
        let interceptor = Arc::new(interceptor_builder);

        Self {
            interceptor,
            history,
            cloud_client,
            log_level,
        }
    }

    /// The resolved `VETO_LOG_LEVEL` (explicit option → env var → `"info"`,
    /// falling back to `"info"` on an unrecognized value). This crate never
    /// installs a subscriber itself; an embedding binary uses this to build
    /// its own `tracing_subscriber::EnvFilter`.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Registers tool signatures with Cloud in the background (best-effort:
    /// a failed registration never prevents wrapping) and returns the
    /// wrapped, interceptor-guarded substitute for `tool`.
    pub fn wrap<T: WrappableTool + 'static>(
        &self,
        name: impl Into<String>,
        tool: T,
        registration: Option<crate::cloud::ToolRegistration>,
    ) -> WrappedTool<T> {
        let name = name.into();
        if let Some(registration) = registration {
            let client = Arc::clone(&self.cloud_client);
            tokio::spawn(async move {
                let response = client.register_tools(vec![registration]).await;
                if !response.success {
                    tracing::warn!(message = ?response.message, "background tool registration failed");
                }
            });
        }
        WrappedTool::new(name, tool, Arc::clone(&self.interceptor))
    }

    pub fn get_history_stats(&self) -> HistoryStats {
        self.history.get_stats()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    pub fn interceptor(&self) -> Arc<Interceptor> {
        Arc::clone(&self.interceptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::fake::FakeCloudClient;

    #[tokio::test]
    async fn init_with_fake_cloud_client_allows_by_default() {
        let veto = Veto::with_cloud_client(
            VetoOptions::default(),
            Arc::new(FakeCloudClient::allowing()),
            Vec::new(),
        );

        let tool = veto.wrap(
            "search",
            crate::wrapper::FnToolAdapter::new(|args| async move { Ok(args) }),
            None,
        );
        let result = tool.invoke(serde_json::json!({"q": "rust"})).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn init_with_fake_cloud_client_denies_when_configured() {
        let veto = Veto::with_cloud_client(
            VetoOptions::default(),
            Arc::new(FakeCloudClient::denying("blocked by org policy")),
            Vec::new(),
        );

        let tool = veto.wrap(
            "transfer",
            crate::wrapper::FnToolAdapter::new(|args| async move { Ok(args) }),
            None,
        );
        let result = tool.invoke(serde_json::json!({"amount": 1_000_000})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn history_stats_reflect_wrapped_calls() {
        let veto = Veto::with_cloud_client(
            VetoOptions::default(),
            Arc::new(FakeCloudClient::allowing()),
            Vec::new(),
        );
        let tool = veto.wrap(
            "search",
            crate::wrapper::FnToolAdapter::new(|args| async move { Ok(args) }),
            None,
        );
        tool.invoke(serde_json::json!({})).await.unwrap();
        tool.invoke(serde_json::json!({})).await.unwrap();

        let stats = veto.get_history_stats();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.allowed_calls, 2);

        veto.clear_history();
        assert_eq!(veto.get_history_stats().total_calls, 0);
    }
}
