//! Hook execution: one sandbox per call, JSON in, contract-checked JSON out.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::error::HookError;
use super::model::{HookConfig, HookContext, HookRequest, HookResponse};
use super::sandbox::{freeze, hook_function, load_module, validate_script, HookFlags, Sandbox, SandboxLimits};
use crate::core::config::HookEngineConfig;

/// Which entry point of the hook module is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Request,
    Response,
}

impl HookPhase {
    pub fn entry_point(self) -> &'static str {
        match self {
            HookPhase::Request => "onRequest",
            HookPhase::Response => "onResponse",
        }
    }

    fn subject(self) -> &'static str {
        match self {
            HookPhase::Request => "request",
            HookPhase::Response => "response",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

/// Executes hook scripts.
///
/// Nothing is cached between invocations: every call builds a new runtime,
/// evaluates the source, and tears everything down afterwards.
#[derive(Debug, Clone)]
pub struct HookEngine {
    limits: SandboxLimits,
    default_timeout: Duration,
}

impl HookEngine {
    pub fn new(limits: SandboxLimits, default_timeout_ms: u64) -> Self {
        Self {
            limits,
            default_timeout: Duration::from_millis(default_timeout_ms.max(1)),
        }
    }

    pub fn from_config(config: &HookEngineConfig) -> Self {
        Self::new(
            SandboxLimits {
                memory_limit: config.memory_limit_bytes,
                max_stack_size: config.max_stack_size_bytes,
                max_script_size: config.max_script_size_bytes,
            },
            config.default_timeout_ms,
        )
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn budget(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or(self.default_timeout)
    }

    /// Check that `code` evaluates to a well-formed hook module.
    pub fn validate(&self, code: &str) -> Result<HookFlags, HookError> {
        validate_script(code, &self.limits, self.default_timeout)
    }

    /// Run `onRequest` synchronously. A script without `onRequest` passes
    /// the request through unchanged.
    pub fn execute_on_request(
        &self,
        code: &str,
        context: &HookContext,
        request: &HookRequest,
        timeout_ms: Option<u64>,
    ) -> Result<HookRequest, HookError> {
        let input = serde_json::to_value(request)
            .map_err(|e| HookError::Execution(format!("Failed to serialize request: {e}")))?;
        match self.call_hook(code, HookPhase::Request, context, &input, self.budget(timeout_ms))? {
            Some(result) => merge_hook_request(&result, request),
            None => Ok(request.clone()),
        }
    }

    /// Run `onResponse` synchronously. A script without `onResponse` passes
    /// the response through unchanged.
    pub fn execute_on_response(
        &self,
        code: &str,
        context: &HookContext,
        response: &HookResponse,
        timeout_ms: Option<u64>,
    ) -> Result<HookResponse, HookError> {
        let input = serde_json::to_value(response)
            .map_err(|e| HookError::Execution(format!("Failed to serialize response: {e}")))?;
        match self.call_hook(code, HookPhase::Response, context, &input, self.budget(timeout_ms))? {
            Some(result) => merge_hook_response(&result, response),
            None => Ok(response.clone()),
        }
    }

    /// Async wrapper around [`Self::execute_on_request`] on the blocking pool.
    pub async fn on_request(
        &self,
        code: String,
        context: HookContext,
        request: HookRequest,
        timeout_ms: Option<u64>,
    ) -> Result<HookRequest, HookError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || {
            engine.execute_on_request(&code, &context, &request, timeout_ms)
        })
        .await
        .map_err(|e| HookError::Execution(format!("Hook worker failed: {e}")))?
    }

    /// Async wrapper around [`Self::execute_on_response`] on the blocking pool.
    pub async fn on_response(
        &self,
        code: String,
        context: HookContext,
        response: HookResponse,
        timeout_ms: Option<u64>,
    ) -> Result<HookResponse, HookError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || {
            engine.execute_on_response(&code, &context, &response, timeout_ms)
        })
        .await
        .map_err(|e| HookError::Execution(format!("Hook worker failed: {e}")))?
    }

    /// Live-traffic request phase driven by a stored configuration.
    ///
    /// Disabled hooks pass through; an enabled hook without code is a
    /// configuration error.
    pub async fn run_on_request(
        &self,
        config: &HookConfig,
        context: HookContext,
        request: HookRequest,
    ) -> Result<HookRequest, HookError> {
        if !config.enabled {
            return Ok(request);
        }
        if !config.has_code() {
            return Err(HookError::ScriptEmpty);
        }
        self.on_request(config.code.clone(), context, request, config.timeout_ms)
            .await
    }

    /// Live-traffic response phase driven by a stored configuration.
    pub async fn run_on_response(
        &self,
        config: &HookConfig,
        context: HookContext,
        response: HookResponse,
    ) -> Result<HookResponse, HookError> {
        if !config.enabled {
            return Ok(response);
        }
        if !config.has_code() {
            return Err(HookError::ScriptEmpty);
        }
        self.on_response(config.code.clone(), context, response, config.timeout_ms)
            .await
    }

    fn call_hook(
        &self,
        code: &str,
        phase: HookPhase,
        context: &HookContext,
        input: &Value,
        budget: Duration,
    ) -> Result<Option<Value>, HookError> {
        if code.trim().is_empty() {
            return Err(HookError::ScriptEmpty);
        }
        self.limits.check_size(code)?;

        let context_json = serde_json::to_string(context)
            .map_err(|e| HookError::Execution(format!("Failed to serialize context: {e}")))?;
        let input_json = serde_json::to_string(input)
            .map_err(|e| HookError::Execution(format!("Failed to serialize {}: {e}", phase.subject())))?;

        let started = Instant::now();
        let sandbox = Sandbox::new(&self.limits, budget)?;
        let output = sandbox.context().with(|ctx| -> Result<Option<String>, HookError> {
            let module = load_module(&sandbox, &ctx, code)?;
            let Some(hook) = hook_function(&sandbox, &ctx, &module, phase.entry_point())? else {
                return Ok(None);
            };

            let context_js = ctx
                .json_parse(context_json)
                .map_err(|e| sandbox.failure(&ctx, e))?;
            let context_js = freeze(&sandbox, &ctx, context_js)?;
            let input_js = ctx
                .json_parse(input_json)
                .map_err(|e| sandbox.failure(&ctx, e))?;

            let result: rquickjs::Value = hook
                .call((context_js, input_js))
                .map_err(|e| sandbox.failure(&ctx, e))?;

            if result.is_undefined() || result.is_null() {
                return Err(HookError::Execution(format!(
                    "{phase} must return the {subject} object (missing `return {subject};`?)",
                    subject = phase.subject()
                )));
            }

            let json = ctx
                .json_stringify(result)
                .map_err(|e| sandbox.failure(&ctx, e))?
                .ok_or_else(|| {
                    HookError::Execution(format!("{phase} must return an object"))
                })?;
            json.to_string()
                .map(Some)
                .map_err(|e| sandbox.failure(&ctx, e))
        });

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &output {
            Ok(Some(_)) => tracing::debug!(
                app = %context.app,
                provider = %context.provider.id,
                phase = %phase,
                elapsed_ms,
                "Hook executed"
            ),
            Ok(None) => tracing::debug!(
                app = %context.app,
                provider = %context.provider.id,
                phase = %phase,
                "Hook not defined, passing through"
            ),
            Err(e) => tracing::warn!(
                app = %context.app,
                provider = %context.provider.id,
                phase = %phase,
                elapsed_ms,
                error = %e,
                "Hook execution failed"
            ),
        }

        match output? {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                HookError::Execution(format!("Failed to parse {phase} return value: {e}"))
            }),
            None => Ok(None),
        }
    }
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::from_config(&HookEngineConfig::default())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_map(
    value: &Value,
    field: &str,
) -> Result<HashMap<String, String>, HookError> {
    let obj = value.as_object().ok_or_else(|| {
        HookError::Execution(format!(
            "{field} must be an object of strings (got {})",
            json_type_name(value)
        ))
    })?;

    let mut out = HashMap::with_capacity(obj.len());
    for (key, v) in obj {
        let Some(s) = v.as_str() else {
            return Err(HookError::Execution(format!(
                "{field}[\"{key}\"] must be a string (got {})",
                json_type_name(v)
            )));
        };
        out.insert(key.clone(), s.to_string());
    }
    Ok(out)
}

fn merge_hook_request(result: &Value, original: &HookRequest) -> Result<HookRequest, HookError> {
    let obj = result.as_object().ok_or_else(|| {
        HookError::Execution(format!(
            "onRequest must return an object (got {})",
            json_type_name(result)
        ))
    })?;

    let headers = match obj.get("headers") {
        Some(v) => string_map(v, "request.headers")?,
        None => original.headers.clone(),
    };
    let queries = match obj.get("queries") {
        Some(v) => string_map(v, "request.queries")?,
        None => original.queries.clone(),
    };
    let body = obj
        .get("body")
        .cloned()
        .unwrap_or_else(|| original.body.clone());

    Ok(HookRequest {
        headers,
        queries,
        body,
    })
}

fn merge_hook_response(
    result: &Value,
    original: &HookResponse,
) -> Result<HookResponse, HookError> {
    let obj = result.as_object().ok_or_else(|| {
        HookError::Execution(format!(
            "onResponse must return an object (got {})",
            json_type_name(result)
        ))
    })?;

    let code = match obj.get("code") {
        Some(v) => {
            let n = v.as_u64().ok_or_else(|| {
                HookError::Execution(format!(
                    "response.code must be an integer (got {})",
                    json_type_name(v)
                ))
            })?;
            if !(100..=999).contains(&n) {
                return Err(HookError::Execution(format!(
                    "response.code is not a valid HTTP status: {n}"
                )));
            }
            n as u16
        }
        None => original.code,
    };
    let headers = match obj.get("headers") {
        Some(v) => string_map(v, "response.headers")?,
        None => original.headers.clone(),
    };
    let body = obj
        .get("body")
        .cloned()
        .unwrap_or_else(|| original.body.clone());

    Ok(HookResponse {
        code,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::model::ProviderInfo;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn context() -> HookContext {
        HookContext {
            app: "codex".to_string(),
            method: "POST".to_string(),
            path: "/v1/responses".to_string(),
            endpoint: "/v1/responses".to_string(),
            url: "https://api.openai.com/v1/responses".to_string(),
            provider: ProviderInfo {
                id: "p1".to_string(),
                name: "Provider".to_string(),
            },
            incoming_headers: HashMap::from([("x-incoming".to_string(), "1".to_string())]),
        }
    }

    fn request() -> HookRequest {
        HookRequest {
            headers: HashMap::from([
                (
                    "x-codex-turn-metadata".to_string(),
                    r#"{"workspaces":{"/Users/xx/proj":{}}}"#.to_string(),
                ),
                ("user-agent".to_string(), "ua".to_string()),
            ]),
            queries: HashMap::new(),
            body: json!({"model": "gpt-4.1"}),
        }
    }

    fn response() -> HookResponse {
        HookResponse {
            code: 200,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: json!({"ok": true}),
        }
    }

    #[test]
    fn test_on_request_can_delete_header() {
        let script = r#"
({
  onRequest: function (context, request) {
    delete request.headers["x-codex-turn-metadata"];
    return request;
  }
})
"#;
        let out = HookEngine::default()
            .execute_on_request(script, &context(), &request(), None)
            .unwrap();
        assert!(!out.headers.contains_key("x-codex-turn-metadata"));
        assert_eq!(out.headers.get("user-agent").unwrap(), "ua");
        assert_eq!(out.body, json!({"model": "gpt-4.1"}));
    }

    #[test]
    fn test_on_request_without_return_is_an_error() {
        let script = r#"
({
  onRequest: function (context, request) {
    request.headers["x-added"] = "1";
  }
})
"#;
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_matches!(result, Err(HookError::Execution(msg)) if msg.contains("return request;"));
    }

    #[test]
    fn test_on_request_returning_null_is_an_error() {
        let script = "({ onRequest: function () { return null; } })";
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_matches!(result, Err(HookError::Execution(_)));
    }

    #[test]
    fn test_on_request_returning_wrong_shape() {
        let script = "({ onRequest: function () { return 42; } })";
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_matches!(result, Err(HookError::Execution(msg)) if msg.contains("got number"));

        let script = r#"({ onRequest: function (c, r) { r.headers["x"] = 1; return r; } })"#;
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_matches!(
            result,
            Err(HookError::Execution(msg)) if msg.contains("request.headers[\"x\"] must be a string")
        );
    }

    #[test]
    fn test_new_object_with_same_shape_is_accepted() {
        let script = r#"
({
  onRequest: function (context, request) {
    return { headers: { "x-only": "yes" }, queries: {}, body: { replaced: true } };
  }
})
"#;
        let out = HookEngine::default()
            .execute_on_request(script, &context(), &request(), None)
            .unwrap();
        assert_eq!(out.headers, HashMap::from([("x-only".to_string(), "yes".to_string())]));
        assert_eq!(out.body, json!({"replaced": true}));
    }

    #[test]
    fn test_missing_fields_fall_back_to_input() {
        let script = "({ onRequest: function (c, r) { return { body: 1 }; } })";
        let out = HookEngine::default()
            .execute_on_request(script, &context(), &request(), None)
            .unwrap();
        assert_eq!(out.headers, request().headers);
        assert_eq!(out.body, json!(1));
    }

    #[test]
    fn test_header_keys_keep_their_case() {
        let script = r#"({ onRequest: function (c, r) { r.headers["X-Custom"] = "v"; return r; } })"#;
        let out = HookEngine::default()
            .execute_on_request(script, &context(), &request(), None)
            .unwrap();
        assert_eq!(out.headers.get("X-Custom").unwrap(), "v");
    }

    #[test]
    fn test_on_request_can_rewrite_queries() {
        let script = r#"
({
  onRequest: function (context, request) {
    request.queries.foo = "bar";
    delete request.queries.remove_me;
    return request;
  }
})
"#;
        let mut req = request();
        req.queries = HashMap::from([
            ("remove_me".to_string(), "1".to_string()),
            ("keep".to_string(), "yes".to_string()),
        ]);
        let out = HookEngine::default()
            .execute_on_request(script, &context(), &req, None)
            .unwrap();
        assert_eq!(out.queries.get("foo").unwrap(), "bar");
        assert_eq!(out.queries.get("keep").unwrap(), "yes");
        assert!(!out.queries.contains_key("remove_me"));
    }

    #[test]
    fn test_missing_hook_passes_through() {
        let script = "({ onResponse: function (c, r) { return r; } })";
        let out = HookEngine::default()
            .execute_on_request(script, &context(), &request(), None)
            .unwrap();
        assert_eq!(out, request());
    }

    #[test]
    fn test_context_is_read_only() {
        let script = r#"
({
  onRequest: function (context, request) {
    context.app = "hijacked";
    context.incomingHeaders["x-incoming"] = "changed";
    request.headers["x-app"] = context.app;
    request.headers["x-seen"] = context.incomingHeaders["x-incoming"];
    return request;
  }
})
"#;
        let out = HookEngine::default()
            .execute_on_request(script, &context(), &request(), None)
            .unwrap();
        assert_eq!(out.headers.get("x-app").unwrap(), "codex");
        assert_eq!(out.headers.get("x-seen").unwrap(), "1");
    }

    #[test]
    fn test_strict_mode_write_to_context_is_an_error() {
        let script = r#"
({
  onRequest: function (context, request) {
    "use strict";
    context.app = "hijacked";
    return request;
  }
})
"#;
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_matches!(result, Err(HookError::Execution(msg)) if msg.starts_with("TypeError"));
    }

    #[test]
    fn test_thrown_error_message_is_verbatim() {
        let script = r#"({ onRequest: function () { throw new Error("boom"); } })"#;
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_eq!(result, Err(HookError::Execution("Error: boom".to_string())));
    }

    #[test]
    fn test_thrown_non_error_value() {
        let script = r#"({ onRequest: function () { throw "nope"; } })"#;
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_eq!(
            result,
            Err(HookError::Execution("uncaught exception: \"nope\"".to_string()))
        );
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let script = "({ onRequest: function (c, r) { while (true) {} } })";
        let started = Instant::now();
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), Some(50));
        assert_matches!(result, Err(HookError::Timeout(msg)) if msg.contains("50 ms"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_no_state_leaks_between_invocations() {
        let script = r#"
({
  onRequest: function (context, request) {
    globalThis.counter = (globalThis.counter || 0) + 1;
    request.headers["x-count"] = String(globalThis.counter);
    return request;
  }
})
"#;
        let engine = HookEngine::default();
        let first = engine.execute_on_request(script, &context(), &request(), None).unwrap();
        let second = engine.execute_on_request(script, &context(), &request(), None).unwrap();
        assert_eq!(first.headers.get("x-count").unwrap(), "1");
        assert_eq!(second.headers.get("x-count").unwrap(), "1");
    }

    #[test]
    fn test_ambient_clock_is_unavailable() {
        let script = r#"({ onRequest: function (c, r) { r.body = Date.now(); return r; } })"#;
        let result = HookEngine::default().execute_on_request(script, &context(), &request(), None);
        assert_matches!(result, Err(HookError::Execution(msg)) if msg.contains("Date.now is not available"));
    }

    #[test]
    fn test_empty_code_is_script_empty() {
        let result = HookEngine::default().execute_on_request("   ", &context(), &request(), None);
        assert_eq!(result, Err(HookError::ScriptEmpty));
    }

    #[test]
    fn test_on_response_can_modify_status_headers_and_body() {
        let script = r#"
({
  onResponse: function (context, response) {
    response.code = 404;
    response.headers["x-hook-response"] = "ok";
    response.body = { ok: false };
    return response;
  }
})
"#;
        let out = HookEngine::default()
            .execute_on_response(script, &context(), &response(), None)
            .unwrap();
        assert_eq!(out.code, 404);
        assert_eq!(out.headers.get("x-hook-response").unwrap(), "ok");
        assert_eq!(out.body, json!({"ok": false}));
    }

    #[test]
    fn test_on_response_invalid_status() {
        let script = "({ onResponse: function (c, r) { r.code = 42; return r; } })";
        let result = HookEngine::default().execute_on_response(script, &context(), &response(), None);
        assert_matches!(result, Err(HookError::Execution(msg)) if msg.contains("not a valid HTTP status"));
    }

    #[test]
    fn test_on_response_without_return_is_an_error() {
        let script = "({ onResponse: function (c, r) { r.code = 500; } })";
        let result = HookEngine::default().execute_on_response(script, &context(), &response(), None);
        assert_matches!(result, Err(HookError::Execution(msg)) if msg.contains("return response;"));
    }

    #[tokio::test]
    async fn test_run_on_request_disabled_passes_through() {
        let config = HookConfig {
            enabled: false,
            code: "({ onRequest: function () { throw new Error('should not run'); } })".to_string(),
            ..HookConfig::default()
        };
        let out = HookEngine::default()
            .run_on_request(&config, context(), request())
            .await
            .unwrap();
        assert_eq!(out, request());
    }

    #[tokio::test]
    async fn test_run_on_request_enabled_without_code() {
        let config = HookConfig {
            enabled: true,
            ..HookConfig::default()
        };
        let result = HookEngine::default()
            .run_on_request(&config, context(), request())
            .await;
        assert_eq!(result, Err(HookError::ScriptEmpty));
    }

    #[tokio::test]
    async fn test_run_on_response_uses_config_timeout() {
        let config = HookConfig {
            enabled: true,
            code: "({ onResponse: function () { for (;;) {} } })".to_string(),
            timeout_ms: Some(30),
            ..HookConfig::default()
        };
        let result = HookEngine::default()
            .run_on_response(&config, context(), response())
            .await;
        assert_matches!(result, Err(HookError::Timeout(_)));
    }
}
