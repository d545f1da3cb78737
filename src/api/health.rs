//! Liveness endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::hooks::HookApiState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "providers": 2,
    "hooks": 1
}))]
pub struct HealthResponse {
    pub status: String,
    /// Registered providers
    pub providers: usize,
    /// Stored hook configurations
    pub hooks: usize,
}

/// Unauthenticated health check.
pub async fn health(State(state): State<Arc<HookApiState>>) -> Json<HealthResponse> {
    tracing::debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        providers: state.providers.list().len(),
        hooks: state.store.len(),
    })
}
