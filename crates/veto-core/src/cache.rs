//! The policy cache (C5): fresh/stale/expired lifecycle over
//! [`DeterministicPolicy`] entries, with single-flight background refresh.
//! Ported from `cloud/policy_cache.py`.

use crate::cloud::CloudClient;
use crate::deterministic::{ArgumentConstraint, DeterministicPolicy, PolicyMode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct CacheEntry {
    policy: DeterministicPolicy,
    stale_at: Instant,
    expired_at: Instant,
}

/// Per-tool-name cache of [`DeterministicPolicy`] documents fetched from
/// Cloud. `get` never blocks on the network: a miss or an expired entry
/// schedules a refresh and returns immediately.
pub struct PolicyCache {
    client: Arc<dyn CloudClient>,
    fresh: Duration,
    max_age: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    refreshing: Mutex<HashSet<String>>,
}

impl PolicyCache {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self::with_horizons(client, Duration::from_secs(60), Duration::from_secs(300))
    }

    pub fn with_horizons(client: Arc<dyn CloudClient>, fresh: Duration, max_age: Duration) -> Self {
        Self {
            client,
            fresh,
            max_age,
            entries: Mutex::new(HashMap::new()),
            refreshing: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the cached policy for `tool_name`, or `None` on a miss or an
    /// expired entry. Fresh and stale hits both return `Some`; stale hits
    /// additionally schedule a background refresh, as do misses and expired
    /// entries. Never returns an entry whose `expired_at` has passed.
    pub async fn get(self: &Arc<Self>, tool_name: &str) -> Option<DeterministicPolicy> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let Some(entry) = entries.get(tool_name) else {
            drop(entries);
            self.schedule_refresh(tool_name);
            return None;
        };

        if now < entry.stale_at {
            return Some(entry.policy.clone());
        }

        if now < entry.expired_at {
            let policy = entry.policy.clone();
            drop(entries);
            self.schedule_refresh(tool_name);
            return Some(policy);
        }

        drop(entries);
        self.schedule_refresh(tool_name);
        None
    }

    pub async fn invalidate(&self, tool_name: &str) {
        self.entries.lock().await.remove(tool_name);
    }

    pub async fn invalidate_all(&self) {
        self.entries.lock().await.clear();
    }

    fn schedule_refresh(self: &Arc<Self>, tool_name: &str) {
        let tool_name = tool_name.to_string();
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let Some(_guard) = RefreshGuard::acquire(&cache, tool_name.clone()).await else {
                return;
            };
            cache.do_refresh(&tool_name).await;
        });
    }

    async fn do_refresh(&self, tool_name: &str) {
        let Some(response) = self.client.fetch_policy(tool_name).await else {
            return;
        };

        let now = Instant::now();
        let policy = parse_policy_response(tool_name, &response, now);

        self.entries.lock().await.insert(
            tool_name.to_string(),
            CacheEntry {
                policy,
                stale_at: now + self.fresh,
                expired_at: now + self.max_age,
            },
        );
    }
}

/// Holds a tool name's slot in the in-progress refresh set for the
/// refresh's duration, releasing it on drop. Covers panics and
/// cancellation, unlike a bare try/finally.
struct RefreshGuard {
    cache: Arc<PolicyCache>,
    tool_name: String,
}

impl RefreshGuard {
    async fn acquire(cache: &Arc<PolicyCache>, tool_name: String) -> Option<Self> {
        let mut refreshing = cache.refreshing.lock().await;
        if !refreshing.insert(tool_name.clone()) {
            return None;
        }
        drop(refreshing);
        Some(Self {
            cache: Arc::clone(cache),
            tool_name,
        })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        let cache = Arc::clone(&self.cache);
        let tool_name = std::mem::take(&mut self.tool_name);
        tokio::spawn(async move {
            cache.refreshing.lock().await.remove(&tool_name);
        });
    }
}

fn parse_policy_response(
    tool_name: &str,
    response: &serde_json::Value,
    fetched_at: Instant,
) -> DeterministicPolicy {
    let mode = match response.get("mode").and_then(|v| v.as_str()) {
        Some("llm") => PolicyMode::Llm,
        _ => PolicyMode::Deterministic,
    };

    let constraints = response
        .get("constraints")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(parse_constraint).collect())
        .unwrap_or_default();

    DeterministicPolicy {
        tool_name: response
            .get("toolName")
            .and_then(|v| v.as_str())
            .unwrap_or(tool_name)
            .to_string(),
        mode,
        constraints,
        has_session_constraints: response.get("sessionConstraints").is_some(),
        has_rate_limits: response.get("rateLimits").is_some(),
        version: response
            .get("version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        fetched_at,
    }
}

fn parse_constraint(data: &serde_json::Value) -> ArgumentConstraint {
    ArgumentConstraint {
        argument_name: data
            .get("argumentName")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        enabled: data.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true),
        greater_than: data.get("greaterThan").and_then(|v| v.as_f64()),
        less_than: data.get("lessThan").and_then(|v| v.as_f64()),
        greater_than_or_equal: data.get("greaterThanOrEqual").and_then(|v| v.as_f64()),
        less_than_or_equal: data.get("lessThanOrEqual").and_then(|v| v.as_f64()),
        minimum: data.get("minimum").and_then(|v| v.as_f64()),
        maximum: data.get("maximum").and_then(|v| v.as_f64()),
        min_length: data.get("minLength").and_then(|v| v.as_u64()).map(|v| v as usize),
        max_length: data.get("maxLength").and_then(|v| v.as_u64()).map(|v| v as usize),
        regex: data.get("regex").and_then(|v| v.as_str()).map(str::to_string),
        enum_values: data.get("enum").and_then(|v| v.as_array()).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        }),
        min_items: data.get("minItems").and_then(|v| v.as_u64()).map(|v| v as usize),
        max_items: data.get("maxItems").and_then(|v| v.as_u64()).map(|v| v as usize),
        required: data.get("required").and_then(|v| v.as_bool()),
        not_null: data.get("notNull").and_then(|v| v.as_bool()),
    }
}
