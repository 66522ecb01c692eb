//! The Cloud client (C4): a stateless HTTP adapter over the Veto Cloud API,
//! plus the approval-poll loop. Mirrors `cloud/client.py` exactly for retry
//! counts, fail-closed behavior, and the poll loop's monotonic deadline.

use super::types::{
    ApiContext, ApprovalData, ApprovalPollOptions, ApprovalStatus, DecisionLogRequest,
    ToolRegistration, ToolRegistrationResponse, ValidationResponse,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_BASE_URL: &str = "https://api.veto.dev";

/// Configuration for [`HttpCloudClient`]. `api_key` falls back to the
/// `VETO_API_KEY` environment variable when absent; its absence entirely is
/// a warning at the façade layer, never a construction failure here.
#[derive(Debug, Clone)]
pub struct VetoCloudConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for VetoCloudConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// The boundary the rest of the crate consumes. Lets tests substitute
/// [`super::fake::FakeCloudClient`] for the real HTTP implementation.
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn register_tools(&self, tools: Vec<ToolRegistration>) -> ToolRegistrationResponse;

    async fn validate(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        context: Option<&ApiContext>,
    ) -> ValidationResponse;

    async fn poll_approval(
        &self,
        approval_id: &str,
        options: ApprovalPollOptions,
    ) -> Result<ApprovalData, crate::error::ApprovalTimeoutError>;

    async fn fetch_policy(&self, tool_name: &str) -> Option<serde_json::Value>;

    /// Fire-and-forget: failures are swallowed, the caller never awaits them.
    fn log_decision(&self, request: DecisionLogRequest);

    fn is_tool_registered(&self, tool_name: &str) -> bool;

    fn clear_registration_cache(&self);
}

/// The production [`CloudClient`], backed by `reqwest` over rustls.
pub struct HttpCloudClient {
    http: reqwest::Client,
    base_url: String,
    config: VetoCloudConfig,
    registered_tools: Mutex<HashSet<String>>,
}

impl HttpCloudClient {
    pub fn new(config: VetoCloudConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("VETO_API_KEY").ok());

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(key) = &api_key {
            headers.insert(
                "X-Veto-API-Key",
                HeaderValue::from_str(key).map_err(|e| anyhow::anyhow!("invalid API key: {e}"))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: VetoCloudConfig {
                api_key,
                ..config
            },
            registered_tools: Mutex::new(HashSet::new()),
        })
    }

    fn registered_names(&self) -> HashSet<String> {
        self.registered_tools.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudClient for HttpCloudClient {
    async fn register_tools(&self, tools: Vec<ToolRegistration>) -> ToolRegistrationResponse {
        let already = self.registered_names();
        let new_tools: Vec<_> = tools
            .into_iter()
            .filter(|t| !already.contains(&t.name))
            .collect();

        if new_tools.is_empty() {
            tracing::debug!("all tools already registered");
            return ToolRegistrationResponse {
                success: true,
                registered_tools: Vec::new(),
                message: Some("All tools already registered".to_string()),
            };
        }

        let url = format!("{}/v1/tools/register", self.base_url);
        let payload = serde_json::json!({ "tools": new_tools });

        let mut last_error = None;
        for attempt in 0..=self.config.retries {
            match self.http.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: serde_json::Value = resp.json().await.unwrap_or_default();
                    let names: Vec<String> =
                        new_tools.iter().map(|t| t.name.clone()).collect();
                    let mut registered = self.registered_tools.lock().unwrap();
                    for name in &names {
                        registered.insert(name.clone());
                    }
                    tracing::info!(tools = ?names, "tools registered successfully");
                    return ToolRegistrationResponse {
                        success: true,
                        registered_tools: names,
                        message: body
                            .get("message")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                    };
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    last_error = Some(format!("API returned status {status}: {text}"));
                }
                Err(e) => last_error = Some(e.to_string()),
            }

            if attempt < self.config.retries {
                tracing::warn!(attempt = attempt + 1, error = ?last_error, "tool registration failed, retrying");
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        let error = last_error.unwrap_or_else(|| "unknown error".to_string());
        tracing::error!(error = %error, "tool registration failed");
        ToolRegistrationResponse {
            success: false,
            registered_tools: Vec::new(),
            message: Some(format!("Registration failed: {error}")),
        }
    }

    async fn validate(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        context: Option<&ApiContext>,
    ) -> ValidationResponse {
        let url = format!("{}/v1/tools/validate", self.base_url);
        let mut payload = serde_json::json!({
            "tool_name": tool_name,
            "arguments": arguments,
        });
        if let Some(ctx) = context {
            payload["context"] = serde_json::to_value(ctx).unwrap_or(serde_json::Value::Null);
        }

        tracing::debug!(tool = tool_name, "validating tool call");

        let mut last_error = None;
        for attempt in 0..=self.config.retries {
            match self.http.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<ValidationResponse>().await {
                        Ok(parsed) => {
                            tracing::debug!(tool = tool_name, decision = ?parsed.decision, "validation result");
                            return parsed;
                        }
                        Err(e) => last_error = Some(e.to_string()),
                    }
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    last_error = Some(format!("API returned status {status}: {text}"));
                }
                Err(e) => last_error = Some(e.to_string()),
            }

            if attempt < self.config.retries {
                tracing::warn!(attempt = attempt + 1, error = ?last_error, "validation request failed, retrying");
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        let error = last_error.unwrap_or_else(|| "unknown error".to_string());
        tracing::error!(tool = tool_name, error = %error, "validation request failed after all retries");
        ValidationResponse::transport_failure(format!("Validation failed: {error}"))
    }

    async fn poll_approval(
        &self,
        approval_id: &str,
        options: ApprovalPollOptions,
    ) -> Result<ApprovalData, crate::error::ApprovalTimeoutError> {
        let url = format!("{}/v1/approvals/{}", self.base_url, approval_id);
        let deadline = Instant::now() + options.timeout;

        tracing::info!(approval_id, timeout = ?options.timeout, "polling for approval resolution");

        loop {
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    if let Ok(data) = resp.json::<serde_json::Value>().await {
                        let status = data
                            .get("status")
                            .and_then(|v| v.as_str())
                            .unwrap_or("pending")
                            .to_string();

                        if status != "pending" {
                            let resolved = ApprovalData {
                                id: data
                                    .get("id")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or(approval_id)
                                    .to_string(),
                                status: parse_approval_status(&status),
                                tool_name: data
                                    .get("toolName")
                                    .and_then(|v| v.as_str())
                                    .map(str::to_string),
                                resolved_by: data
                                    .get("resolvedBy")
                                    .and_then(|v| v.as_str())
                                    .map(str::to_string),
                            };
                            tracing::info!(approval_id, status = %status, "approval resolved");
                            return Ok(resolved);
                        }
                    }
                }
                Ok(resp) => {
                    tracing::warn!(status = %resp.status(), "approval poll request failed");
                }
                Err(e) => {
                    tracing::warn!(approval_id, error = %e, "approval poll error");
                }
            }

            if Instant::now() >= deadline {
                return Err(crate::error::ApprovalTimeoutError {
                    approval_id: approval_id.to_string(),
                    timeout: options.timeout,
                });
            }

            tokio::time::sleep(options.poll_interval).await;
        }
    }

    async fn fetch_policy(&self, tool_name: &str) -> Option<serde_json::Value> {
        let url = format!(
            "{}/v1/policies/{}",
            self.base_url,
            urlencoding_encode(tool_name)
        );
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<serde_json::Value>().await.ok()
    }

    fn log_decision(&self, request: DecisionLogRequest) {
        let url = format!("{}/v1/decisions", self.base_url);
        let http = self.http.clone();
        tokio::spawn(async move {
            let _ = http.post(&url).json(&request).send().await;
        });
    }

    fn is_tool_registered(&self, tool_name: &str) -> bool {
        self.registered_tools.lock().unwrap().contains(tool_name)
    }

    fn clear_registration_cache(&self) {
        self.registered_tools.lock().unwrap().clear();
    }
}

fn parse_approval_status(s: &str) -> ApprovalStatus {
    match s {
        "approved" => ApprovalStatus::Approved,
        "denied" => ApprovalStatus::Denied,
        "expired" => ApprovalStatus::Expired,
        _ => ApprovalStatus::Pending,
    }
}

/// Minimal percent-encoding for a path segment, avoiding a dependency on the
/// `url` or `percent-encoding` crates for a single call site.
fn urlencoding_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_client() {
        let config = VetoCloudConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.retries, 2);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpCloudClient::new(VetoCloudConfig {
            base_url: "https://example.test/".to_string(),
            ..VetoCloudConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url, "https://example.test");
    }

    #[test]
    fn url_encoding_escapes_reserved_characters() {
        assert_eq!(urlencoding_encode("pay/transfer"), "pay%2Ftransfer");
        assert_eq!(urlencoding_encode("simple_tool"), "simple_tool");
    }
}
