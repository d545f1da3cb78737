//! HTTP layer: hook administration, dry runs and health.

pub mod health;
pub mod hooks;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::core::request_id_middleware;

pub use health::{health, HealthResponse};
pub use hooks::{hooks_router, verify_admin_auth, HookApiDoc, HookApiState};

/// Assemble the full application router.
pub fn router(state: Arc<HookApiState>) -> Router {
    let swagger_ui =
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", HookApiDoc::openapi());

    Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/admin/v1", hooks_router(state))
        .merge(swagger_ui)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
