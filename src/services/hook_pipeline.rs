//! Live-traffic hook application for one proxied exchange.

use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::scripting::headers::{
    apply_queries_to_url, forwardable_headers, header_string_map, join_endpoint,
    query_map_from_url,
};
use crate::scripting::{
    HookContext, HookEngine, HookError, HookRequest, HookResponse, ProviderInfo,
};
use crate::services::{HookStore, ProviderService};

/// The request as it should be sent upstream after the hook ran.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// Resolves the stored hook for a provider and applies it to both phases of
/// an exchange. Providers without a stored hook pass through untouched.
pub struct HookPipeline {
    engine: HookEngine,
    store: Arc<HookStore>,
    providers: Arc<ProviderService>,
}

impl HookPipeline {
    pub fn new(engine: HookEngine, store: Arc<HookStore>, providers: Arc<ProviderService>) -> Self {
        Self {
            engine,
            store,
            providers,
        }
    }

    /// Build the read-only context for an exchange.
    ///
    /// `path` is the path the client called, `endpoint` the upstream path
    /// (optionally with a query string) relative to the provider base URL.
    pub fn context(
        &self,
        app: &str,
        provider_id: &str,
        method: &str,
        path: &str,
        endpoint: &str,
        incoming: &HeaderMap,
    ) -> Result<HookContext, HookError> {
        let provider = self.providers.get(app, provider_id).ok_or_else(|| {
            HookError::Config(format!(
                "provider '{provider_id}' not found for app '{app}'"
            ))
        })?;

        Ok(HookContext {
            app: app.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            endpoint: endpoint.split('?').next().unwrap_or(endpoint).to_string(),
            url: join_endpoint(&provider.api_base, endpoint),
            provider: ProviderInfo {
                id: provider.id,
                name: provider.name,
            },
            incoming_headers: header_string_map(incoming),
        })
    }

    /// Apply the request phase. Blacklisted headers never reach the script
    /// or the upstream request.
    pub async fn rewrite_request(
        &self,
        context: &HookContext,
        body: Value,
    ) -> Result<OutboundRequest, HookError> {
        let view = HookRequest {
            headers: forwardable_headers(&context.incoming_headers),
            queries: query_map_from_url(&context.url),
            body,
        };

        let Some(config) = self.store.get(&context.app, &context.provider.id) else {
            return Ok(OutboundRequest {
                url: context.url.clone(),
                headers: view.headers,
                body: view.body,
            });
        };

        let original_queries = view.queries.clone();
        let out = self
            .engine
            .run_on_request(&config, context.clone(), view)
            .await?;

        let url = if out.queries == original_queries {
            context.url.clone()
        } else {
            apply_queries_to_url(&context.url, &out.queries)
                .map_err(|e| HookError::Execution(format!("Failed to rebuild URL: {e}")))?
        };

        Ok(OutboundRequest {
            url,
            headers: out.headers,
            body: out.body,
        })
    }

    /// Apply the response phase to an upstream response.
    pub async fn rewrite_response(
        &self,
        context: &HookContext,
        status: u16,
        headers: &HeaderMap,
        body: Value,
    ) -> Result<HookResponse, HookError> {
        let view = HookResponse {
            code: status,
            headers: header_string_map(headers),
            body,
        };

        match self.store.get(&context.app, &context.provider.id) {
            Some(config) => {
                self.engine
                    .run_on_response(&config, context.clone(), view)
                    .await
            }
            None => Ok(view),
        }
    }
}
