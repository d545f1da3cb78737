//! Engine client seam used by the editor harness.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::core::ErrorResponse;
use crate::scripting::{HookError, HookErrorKind, HookTestRequest, HookTestResult};
use crate::services::HookTestService;

/// Anything that can run `testRequestHookScript`.
#[async_trait]
pub trait HookTestClient: Send + Sync {
    async fn test_request_hook_script(
        &self,
        request: HookTestRequest,
    ) -> Result<HookTestResult, HookError>;
}

#[async_trait]
impl HookTestClient for HookTestService {
    async fn test_request_hook_script(
        &self,
        request: HookTestRequest,
    ) -> Result<HookTestResult, HookError> {
        HookTestService::test_request_hook_script(self, request).await
    }
}

/// Slack on top of the hook's own budget before the call is given up.
const RESPONSE_MARGIN: Duration = Duration::from_secs(10);
/// Lower bound, also used when the server default budget applies.
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP timeout for a dry run; always longer than the engine's budget so an
/// overrun is reported as `Timeout` by the engine, not as a transport failure.
fn request_timeout(timeout_ms: Option<u64>) -> Duration {
    timeout_ms
        .map(|ms| Duration::from_millis(ms).saturating_add(RESPONSE_MARGIN))
        .map_or(MIN_REQUEST_TIMEOUT, |t| t.max(MIN_REQUEST_TIMEOUT))
}

/// Calls `POST /admin/v1/hooks/test` on a remote server.
pub struct HttpHookTestClient {
    client: Client,
    base_url: String,
    admin_key: String,
}

impl HttpHookTestClient {
    pub fn new(base_url: impl Into<String>, admin_key: impl Into<String>) -> Result<Self, HookError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HookError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, admin_key))
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        admin_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_key: admin_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/admin/v1/hooks/test", self.base_url)
    }
}

/// Map an error body back into the taxonomy. Kinds outside the taxonomy
/// (auth, routing, server faults) mean the engine could not serve the call.
fn error_from_response(status: u16, body: &[u8]) -> HookError {
    let Ok(parsed) = serde_json::from_slice::<ErrorResponse>(body) else {
        return HookError::Transport(format!(
            "unexpected response from hook engine (HTTP {status})"
        ));
    };

    match serde_json::from_value::<HookErrorKind>(serde_json::Value::String(
        parsed.error.error_type.clone(),
    )) {
        Ok(kind) => HookError::from_wire(kind, parsed.error.message),
        Err(_) => HookError::Transport(format!(
            "{} (HTTP {status}, {})",
            parsed.error.message, parsed.error.error_type
        )),
    }
}

#[async_trait]
impl HookTestClient for HttpHookTestClient {
    async fn test_request_hook_script(
        &self,
        request: HookTestRequest,
    ) -> Result<HookTestResult, HookError> {
        let url = self.endpoint();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.admin_key)
            .timeout(request_timeout(request.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| HookError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| HookError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let err = error_from_response(status.as_u16(), &body);
            tracing::debug!(url = %url, status = status.as_u16(), kind = ?err.kind(), "Dry run rejected");
            return Err(err);
        }

        serde_json::from_slice(&body).map_err(|e| {
            HookError::Transport(format!("hook engine returned an invalid result: {e}"))
        })
    }
}
