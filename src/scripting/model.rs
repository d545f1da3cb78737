//! Object model shared between the host and hook scripts.
//!
//! Scripts see three bindings:
//!
//! ```js
//! ({
//!   onRequest: function (context, request) {
//!     delete request.headers["x-codex-turn-metadata"];
//!     return request;
//!   },
//!   onResponse: function (context, response) {
//!     response.headers["x-hooked"] = "1";
//!     return response;
//!   }
//! })
//! ```
//!
//! `context` is read-only, `request`/`response` are plain data that the
//! script mutates (or replaces) and returns. Everything crosses the sandbox
//! boundary as JSON, so these types are the whole contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Scripting language of a hook. Only one is supported today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HookLanguage {
    #[default]
    Script,
}

/// Persisted rewrite-hook configuration for one provider.
///
/// Unknown fields are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "enabled": true,
    "language": "script",
    "code": "({ onRequest: function (context, request) { return request; } })",
    "timeoutMs": 1000
}))]
pub struct HookConfig {
    /// Whether the hook runs on live traffic
    #[serde(default)]
    pub enabled: bool,
    /// Script language (always "script")
    #[serde(default)]
    pub language: HookLanguage,
    /// Hook source; empty means no-op
    #[serde(default)]
    pub code: String,
    /// Per-invocation budget in milliseconds; engine default when absent
    #[serde(
        rename = "timeoutMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

impl HookConfig {
    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

/// Identifying metadata of the active provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
}

/// Read-only invocation context, frozen before it reaches the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookContext {
    pub app: String,
    pub method: String,
    pub path: String,
    pub endpoint: String,
    pub url: String,
    pub provider: ProviderInfo,
    pub incoming_headers: HashMap<String, String>,
}

/// Mutable request view handed to `onRequest`; the result is sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRequest {
    pub headers: HashMap<String, String>,
    pub queries: HashMap<String, String>,
    pub body: Value,
}

/// Mutable response view handed to `onResponse`; the result goes back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResponse {
    pub code: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// Input of a request-phase dry run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "providerId": "openai-main",
    "appId": "codex",
    "code": "({ onRequest: function (c, r) { delete r.headers['x-codex-turn-metadata']; return r; } })",
    "headers": {"content-type": "application/json", "x-codex-turn-metadata": "{}"},
    "body": {"model": "gpt-4.1", "input": "ping"},
    "endpoint": "/v1/responses"
}))]
pub struct HookTestRequest {
    pub provider_id: String,
    pub app_id: String,
    pub code: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub body: Value,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Outcome of a successful dry run: what would have been sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "url": "https://api.openai.com/v1/responses",
    "headers": {"content-type": "application/json"},
    "body": {"model": "gpt-4.1", "input": "ping"}
}))]
pub struct HookTestResult {
    pub url: String,
    pub headers: HashMap<String, String>,
    #[schema(value_type = Object)]
    pub body: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_hook_config_round_trips_unknown_fields() {
        let raw = json!({
            "enabled": true,
            "language": "script",
            "code": "({})",
            "timeoutMs": 250,
            "uiCollapsed": false,
            "notes": {"author": "ops"}
        });
        let config: HookConfig = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(config.timeout_ms, Some(250));
        assert_eq!(config.extra.get("notes"), Some(&json!({"author": "ops"})));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_hook_config_defaults() {
        let config: HookConfig = serde_json::from_value(json!({})).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.language, HookLanguage::Script);
        assert!(!config.has_code());

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("timeoutMs").is_none());
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let result: Result<HookConfig, _> =
            serde_json::from_value(json!({"language": "python", "code": ""}));
        assert!(result.is_err());
    }

    #[test]
    fn test_context_uses_script_field_names() {
        let ctx = HookContext {
            app: "codex".to_string(),
            method: "POST".to_string(),
            path: "/v1/responses".to_string(),
            endpoint: "/v1/responses".to_string(),
            url: "https://api.openai.com/v1/responses".to_string(),
            provider: ProviderInfo {
                id: "p1".to_string(),
                name: "Provider".to_string(),
            },
            incoming_headers: HashMap::new(),
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert!(json.get("incomingHeaders").is_some());
        assert_eq!(json["provider"]["id"], "p1");
    }

    #[test]
    fn test_test_request_accepts_null_body() {
        let req: HookTestRequest = serde_json::from_value(json!({
            "providerId": "p1",
            "appId": "codex",
            "code": "({})",
            "headers": {},
            "body": null,
            "endpoint": "/v1/responses"
        }))
        .unwrap();
        assert_eq!(req.body, Value::Null);
        assert_eq!(req.timeout_ms, None);
    }
}
