//! Request-phase dry runs of unsaved hook code against synthetic input.

use std::sync::Arc;

use crate::scripting::headers::{apply_queries_to_url, join_endpoint, query_map_from_url};
use crate::scripting::{
    HookContext, HookEngine, HookError, HookRequest, HookTestRequest, HookTestResult,
    ProviderInfo,
};
use crate::services::ProviderService;

/// Executes `testRequestHookScript` calls.
///
/// Only the request phase can be dry-run; response hooks run on live traffic only.
pub struct HookTestService {
    engine: HookEngine,
    providers: Arc<ProviderService>,
}

impl HookTestService {
    pub fn new(engine: HookEngine, providers: Arc<ProviderService>) -> Self {
        Self { engine, providers }
    }

    pub async fn test_request_hook_script(
        &self,
        request: HookTestRequest,
    ) -> Result<HookTestResult, HookError> {
        if request.code.trim().is_empty() {
            return Err(HookError::ScriptEmpty);
        }
        let endpoint = request.endpoint.trim();
        if endpoint.is_empty() {
            return Err(HookError::Config("endpoint is required".to_string()));
        }

        let provider = self
            .providers
            .get(&request.app_id, &request.provider_id)
            .ok_or_else(|| {
                HookError::Config(format!(
                    "provider '{}' not found for app '{}'",
                    request.provider_id, request.app_id
                ))
            })?;

        let url = join_endpoint(&provider.api_base, endpoint);
        url::Url::parse(&url).map_err(|e| {
            HookError::Config(format!("provider api_base does not form a valid URL ({url}): {e}"))
        })?;
        let path = endpoint.split('?').next().unwrap_or(endpoint).to_string();

        let context = HookContext {
            app: request.app_id.clone(),
            method: "POST".to_string(),
            path: path.clone(),
            endpoint: path,
            url: url.clone(),
            provider: ProviderInfo {
                id: provider.id.clone(),
                name: provider.name.clone(),
            },
            incoming_headers: request.headers.clone(),
        };
        let view = HookRequest {
            headers: request.headers,
            queries: query_map_from_url(&url),
            body: request.body,
        };

        tracing::debug!(
            app = %context.app,
            provider = %context.provider.id,
            endpoint = %context.endpoint,
            "Running request hook dry run"
        );
        let out = self
            .engine
            .on_request(request.code, context, view, request.timeout_ms)
            .await?;

        let url = apply_queries_to_url(&url, &out.queries)
            .map_err(|e| HookError::Execution(format!("Failed to rebuild URL: {e}")))?;

        Ok(HookTestResult {
            url,
            headers: out.headers,
            body: out.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ProviderConfig;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;

    fn service() -> HookTestService {
        let providers = ProviderService::new(vec![ProviderConfig {
            id: "openai-main".to_string(),
            name: "OpenAI".to_string(),
            app: "codex".to_string(),
            api_base: "https://api.openai.com/".to_string(),
        }]);
        HookTestService::new(HookEngine::default(), Arc::new(providers))
    }

    fn test_request(code: &str) -> HookTestRequest {
        HookTestRequest {
            provider_id: "openai-main".to_string(),
            app_id: "codex".to_string(),
            code: code.to_string(),
            headers: HashMap::from([
                ("content-type".to_string(), "application/json".to_string()),
                ("x-codex-turn-metadata".to_string(), "{}".to_string()),
            ]),
            body: json!({"model": "gpt-4.1", "input": "ping"}),
            endpoint: "/v1/responses".to_string(),
            timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn test_dry_run_deletes_header() {
        let code = "({onRequest:function(c,r){delete r.headers['x-codex-turn-metadata']; return r;}})";
        let result = service()
            .test_request_hook_script(test_request(code))
            .await
            .unwrap();
        assert_eq!(result.url, "https://api.openai.com/v1/responses");
        assert!(!result.headers.contains_key("x-codex-turn-metadata"));
        assert_eq!(result.headers.get("content-type").unwrap(), "application/json");
        assert_eq!(result.body, json!({"model": "gpt-4.1", "input": "ping"}));
    }

    #[tokio::test]
    async fn test_dry_run_exposes_context() {
        let code = r#"
({
  onRequest: function (context, request) {
    request.body = {
      app: context.app,
      url: context.url,
      provider: context.provider.name,
      endpoint: context.endpoint,
      incoming: context.incomingHeaders["x-codex-turn-metadata"]
    };
    return request;
  }
})
"#;
        let result = service()
            .test_request_hook_script(test_request(code))
            .await
            .unwrap();
        assert_eq!(
            result.body,
            json!({
                "app": "codex",
                "url": "https://api.openai.com/v1/responses",
                "provider": "OpenAI",
                "endpoint": "/v1/responses",
                "incoming": "{}"
            })
        );
    }

    #[tokio::test]
    async fn test_dry_run_query_rewrite_is_reflected_in_url() {
        let code = "({onRequest:function(c,r){r.queries['api-version']='2024-10-01'; delete r.queries.drop; return r;}})";
        let mut req = test_request(code);
        req.endpoint = "/v1/responses?drop=1".to_string();
        let result = service().test_request_hook_script(req).await.unwrap();
        assert_eq!(
            result.url,
            "https://api.openai.com/v1/responses?api-version=2024-10-01"
        );
    }

    #[tokio::test]
    async fn test_dry_run_empty_code() {
        let result = service().test_request_hook_script(test_request("  ")).await;
        assert_eq!(result, Err(HookError::ScriptEmpty));
    }

    #[tokio::test]
    async fn test_dry_run_unknown_provider() {
        let mut req = test_request("({})");
        req.provider_id = "missing".to_string();
        let result = service().test_request_hook_script(req).await;
        assert_matches!(result, Err(HookError::Config(msg)) if msg.contains("not found"));
    }

    #[tokio::test]
    async fn test_dry_run_missing_return() {
        let code = "({onRequest:function(c,r){ r.headers['x'] = 'y'; }})";
        let result = service().test_request_hook_script(test_request(code)).await;
        assert_matches!(result, Err(HookError::Execution(_)));
    }

    #[tokio::test]
    async fn test_dry_run_respects_timeout() {
        let mut req = test_request("({onRequest:function(c,r){ while(true){} }})");
        req.timeout_ms = Some(40);
        let result = service().test_request_hook_script(req).await;
        assert_matches!(result, Err(HookError::Timeout(_)));
    }
}
