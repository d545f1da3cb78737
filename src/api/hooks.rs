//! Admin API for hook configurations and request-phase dry runs.
//!
//! All endpoints require ADMIN_KEY authentication.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::core::{AppConfig, AppError, ErrorDetail, ErrorResponse, Result};
use crate::scripting::headers::string_header_map;
use crate::scripting::{
    HookConfig, HookEngine, HookError, HookErrorKind, HookLanguage, HookTestRequest,
    HookTestResult,
};
use crate::services::{HookStore, HookTestService, ProviderService, StoredHook};

/// OpenAPI documentation for the admin API.
#[derive(OpenApi)]
#[openapi(
    paths(list_hooks, get_hook, put_hook, delete_hook, test_hook, reload_providers),
    components(
        schemas(
            HookConfig,
            HookLanguage,
            HookTestRequest,
            HookTestResult,
            HookErrorKind,
            StoredHook,
            HookListResponse,
            DeleteHookResponse,
            ReloadProvidersResponse,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "hooks", description = "Hook configuration and dry-run endpoints"),
        (name = "providers", description = "Provider registry")
    ),
    info(
        title = "Hookgate Admin API",
        version = "1.0.0",
        description = "Manage per-provider request/response rewrite hooks and dry-run them.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://127.0.0.1:18100", description = "Local development server")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct HookApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

/// Shared state of the hook admin routes.
pub struct HookApiState {
    pub store: Arc<HookStore>,
    pub providers: Arc<ProviderService>,
    pub tester: Arc<HookTestService>,
    pub engine: HookEngine,
    pub admin_key: String,
    /// YAML file providers are reloaded from
    pub config_path: Option<String>,
}

/// Verify admin authentication
pub fn verify_admin_auth(headers: &HeaderMap, admin_key: &str) -> Result<()> {
    let provided = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if provided != admin_key {
        return Err(AppError::Unauthorized);
    }

    Ok(())
}

/// Response containing every stored hook
#[derive(Debug, Serialize, ToSchema)]
pub struct HookListResponse {
    pub hooks: Vec<StoredHook>,
}

/// Response of a delete
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteHookResponse {
    /// Whether a hook was stored for the target
    pub deleted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadProvidersResponse {
    /// Number of providers registered after the reload
    pub providers: usize,
}

fn ensure_provider(state: &HookApiState, app: &str, provider_id: &str) -> Result<()> {
    if state.providers.get(app, provider_id).is_none() {
        return Err(AppError::NotFound(format!(
            "provider '{provider_id}' not found for app '{app}'"
        )));
    }
    Ok(())
}

/// List all stored hooks
#[utoipa::path(
    get,
    path = "/admin/v1/hooks",
    tag = "hooks",
    responses(
        (status = 200, description = "Stored hooks", body = HookListResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_hooks(
    State(state): State<Arc<HookApiState>>,
    headers: HeaderMap,
) -> Result<Json<HookListResponse>> {
    verify_admin_auth(&headers, &state.admin_key)?;
    Ok(Json(HookListResponse {
        hooks: state.store.list(),
    }))
}

/// Get the hook of one provider
#[utoipa::path(
    get,
    path = "/admin/v1/hooks/{app}/{provider}",
    tag = "hooks",
    params(
        ("app" = String, Path, description = "Application id"),
        ("provider" = String, Path, description = "Provider id")
    ),
    responses(
        (status = 200, description = "Hook configuration", body = HookConfig),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "No hook stored", body = ErrorResponse)
    )
)]
pub async fn get_hook(
    State(state): State<Arc<HookApiState>>,
    headers: HeaderMap,
    Path((app, provider_id)): Path<(String, String)>,
) -> Result<Json<HookConfig>> {
    verify_admin_auth(&headers, &state.admin_key)?;

    state
        .store
        .get(&app, &provider_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no hook stored for {app}/{provider_id}")))
}

/// Create or replace the hook of one provider
///
/// Non-empty code is evaluated once to check that it forms a hook module.
/// Unknown fields are stored as received.
#[utoipa::path(
    put,
    path = "/admin/v1/hooks/{app}/{provider}",
    tag = "hooks",
    params(
        ("app" = String, Path, description = "Application id"),
        ("provider" = String, Path, description = "Provider id")
    ),
    request_body = HookConfig,
    responses(
        (status = 200, description = "Hook stored", body = HookConfig),
        (status = 400, description = "Invalid hook", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Unknown provider", body = ErrorResponse),
        (status = 422, description = "Script failed to evaluate", body = ErrorResponse)
    )
)]
pub async fn put_hook(
    State(state): State<Arc<HookApiState>>,
    headers: HeaderMap,
    Path((app, provider_id)): Path<(String, String)>,
    Json(config): Json<HookConfig>,
) -> Result<Json<HookConfig>> {
    verify_admin_auth(&headers, &state.admin_key)?;
    ensure_provider(&state, &app, &provider_id)?;

    if config.has_code() {
        let engine = state.engine.clone();
        let code = config.code.clone();
        let flags = tokio::task::spawn_blocking(move || engine.validate(&code))
            .await
            .map_err(|e| AppError::Internal(format!("Hook validation failed: {e}")))??;
        tracing::debug!(
            app = %app,
            provider = %provider_id,
            on_request = flags.on_request,
            on_response = flags.on_response,
            "Hook script validated"
        );
    } else if config.enabled {
        tracing::warn!(
            app = %app,
            provider = %provider_id,
            "Hook enabled without code; live traffic will be rejected until code is set"
        );
    }

    let previous = state
        .store
        .put(&app, &provider_id, config.clone())
        .await
        .map_err(AppError::Config)?;

    tracing::info!(
        app = %app,
        provider = %provider_id,
        enabled = config.enabled,
        replaced = previous.is_some(),
        "Hook stored"
    );
    Ok(Json(config))
}

/// Delete the hook of one provider
#[utoipa::path(
    delete,
    path = "/admin/v1/hooks/{app}/{provider}",
    tag = "hooks",
    params(
        ("app" = String, Path, description = "Application id"),
        ("provider" = String, Path, description = "Provider id")
    ),
    responses(
        (status = 200, description = "Hook removed", body = DeleteHookResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "No hook stored", body = ErrorResponse)
    )
)]
pub async fn delete_hook(
    State(state): State<Arc<HookApiState>>,
    headers: HeaderMap,
    Path((app, provider_id)): Path<(String, String)>,
) -> Result<Json<DeleteHookResponse>> {
    verify_admin_auth(&headers, &state.admin_key)?;

    let removed = state
        .store
        .remove(&app, &provider_id)
        .await
        .map_err(AppError::Config)?;
    if removed.is_none() {
        return Err(AppError::NotFound(format!(
            "no hook stored for {app}/{provider_id}"
        )));
    }

    tracing::info!(app = %app, provider = %provider_id, "Hook removed");
    Ok(Json(DeleteHookResponse { deleted: true }))
}

/// Dry-run the request phase of unsaved hook code
#[utoipa::path(
    post,
    path = "/admin/v1/hooks/test",
    tag = "hooks",
    request_body = HookTestRequest,
    responses(
        (status = 200, description = "What would be sent upstream", body = HookTestResult),
        (status = 400, description = "Empty script, unknown provider or invalid input", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 422, description = "Script threw or returned the wrong shape", body = ErrorResponse),
        (status = 504, description = "Execution budget exceeded", body = ErrorResponse)
    )
)]
pub async fn test_hook(
    State(state): State<Arc<HookApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<HookTestResult>> {
    verify_admin_auth(&headers, &state.admin_key)?;
    let request = parse_test_request(&body)?;

    let app = request.app_id.clone();
    let provider_id = request.provider_id.clone();
    match state.tester.test_request_hook_script(request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            if !e.kind().is_validation() {
                tracing::info!(
                    app = %app,
                    provider = %provider_id,
                    kind = ?e.kind(),
                    error = %e,
                    "Hook dry run failed"
                );
            }
            Err(AppError::Hook(e))
        }
    }
}

/// Decode a dry-run request so that bad input surfaces as a hook error.
///
/// Malformed JSON is `InvalidBody`, a non-string header value is
/// `InvalidHeaders`; missing or mistyped fields are a plain bad request.
fn parse_test_request(body: &[u8]) -> Result<HookTestRequest> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| HookError::InvalidBody(format!("request is not valid JSON: {e}")))?;
    if let Some(headers) = value.get("headers") {
        string_header_map(headers)?;
    }
    serde_json::from_value(value)
        .map_err(|e| AppError::BadRequest(format!("invalid dry-run request: {e}")))
}

/// Reload the provider registry from the configuration file
#[utoipa::path(
    post,
    path = "/admin/v1/providers/reload",
    tag = "providers",
    responses(
        (status = 200, description = "Providers reloaded", body = ReloadProvidersResponse),
        (status = 400, description = "Server was started without a configuration file", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Configuration file could not be read", body = ErrorResponse)
    )
)]
pub async fn reload_providers(
    State(state): State<Arc<HookApiState>>,
    headers: HeaderMap,
) -> Result<Json<ReloadProvidersResponse>> {
    verify_admin_auth(&headers, &state.admin_key)?;

    let path = state.config_path.as_deref().ok_or_else(|| {
        AppError::BadRequest("no configuration file to reload; set HOOKGATE_CONFIG".to_string())
    })?;
    let config = AppConfig::load(path)?;
    let count = config.providers.len();
    state.providers.reload(config.providers);

    tracing::info!(path = %path, providers = count, "Providers reloaded via Admin API");
    Ok(Json(ReloadProvidersResponse { providers: count }))
}

/// Build the `/admin/v1` router.
pub fn hooks_router(state: Arc<HookApiState>) -> Router {
    Router::new()
        .route("/hooks", get(list_hooks))
        .route("/hooks/test", post(test_hook))
        .route("/providers/reload", post(reload_providers))
        .route(
            "/hooks/:app/:provider",
            get(get_hook).put(put_hook).delete(delete_hook),
        )
        .with_state(state)
}

