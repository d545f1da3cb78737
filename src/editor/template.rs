//! Built-in example hook and default dry-run inputs.

/// Endpoint every dry run is executed against.
pub const TEST_ENDPOINT: &str = "/v1/responses";

pub const DEFAULT_TEST_HEADERS: &str = r#"{
  "content-type": "application/json"
}"#;

pub const DEFAULT_TEST_BODY: &str = r#"{
  "model": "gpt-4.1",
  "input": "ping"
}"#;

/// Canonical example inserted by `insert_template`.
pub const REQUEST_HOOK_TEMPLATE: &str = r#"({
  // context is read-only: app, method, path, endpoint, url, provider, incomingHeaders
  onRequest: function (context, request) {
    // request: { headers, queries, body }
    delete request.headers["x-codex-turn-metadata"];
    if (request.body && typeof request.body === "object") {
      request.body.metadata = { app: context.app, provider: context.provider.id };
    }
    return request;
  },

  onResponse: function (context, response) {
    // response: { code, headers, body }
    response.headers["x-rewritten-by"] = "hook";
    return response;
  }
})
"#;
