//! Logging setup and request-scoped context.
//!
//! Every HTTP request gets an id stored in a task-local so that hook
//! execution logs can be correlated with the request that triggered them.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Local;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    /// Task-local storage for the current request ID.
    pub static REQUEST_ID: String;
}

/// Get the current request ID from context, if set.
///
/// Returns an empty string if no request ID is set.
pub fn get_request_id() -> String {
    REQUEST_ID.try_with(|id| id.clone()).unwrap_or_default()
}

/// Generate a new unique request ID using UUID v4.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Assign a request id (reusing a client-supplied one), run the request
/// inside it, and echo it back on the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = REQUEST_ID
        .scope(request_id.clone(), next.run(request).instrument(span))
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` replaces the default filter, but the HTTP client/server
/// crates are always pinned to `warn`. `NO_COLOR` disables ANSI output.
pub fn init_tracing() {
    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hookgate=debug".to_string());
    let filter = tracing_subscriber::EnvFilter::new(format!(
        "{},hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn",
        base_filter
    ));
    let no_color = std::env::var("NO_COLOR").is_ok();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTime)
                .with_ansi(!no_color),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_get_request_id_outside_scope() {
        assert_eq!(get_request_id(), "");
    }

    #[tokio::test]
    async fn test_get_request_id_inside_scope() {
        let id = REQUEST_ID
            .scope("req-1".to_string(), async { get_request_id() })
            .await;
        assert_eq!(id, "req-1");
    }

    #[test]
    fn test_generate_request_id_is_unique() {
        assert_ne!(generate_request_id(), generate_request_id());
    }

    #[tokio::test]
    async fn test_middleware_echoes_request_id() {
        let app = Router::new()
            .route("/", get(|| async { get_request_id() }))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "abc-123");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"abc-123");
    }

    #[tokio::test]
    async fn test_middleware_generates_request_id() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert_eq!(id.len(), 36);
    }
}
