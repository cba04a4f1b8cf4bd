use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Request, Response},
    routing::get,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::{
    error::AppError,
    routes::{create_api_router, doc::scalar_docs, health, uploads::MULTIPART_OVERHEAD},
    state::AppState,
};

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_IN_FLIGHT: usize = 100;
const MIN_BODY_LIMIT: usize = 1024 * 1024;

fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}

pub fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.max(MIN_BODY_LIMIT) + MULTIPART_OVERHEAD
}

/// Full application: `/health`, `/api/*`, `/docs`, wrapped in the HTTP middleware stack.
pub fn build_app(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;
    let header = HeaderName::from_static(REQUEST_ID_HEADER);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id(request)
            )
        })
        .on_request(|request: &Request<_>, _span: &Span| {
            tracing::debug!(method = %request.method(), uri = %request.uri(), "request started");
        })
        .on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
            tracing::info!(
                status = %response.status(),
                ms = %latency.as_millis(),
                "request finished"
            );
        });

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router(max_upload_bytes))
        .merge(scalar_docs())
        .fallback(|| async { AppError::NotFound })
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(header.clone()))
        .layer(SetRequestIdLayer::new(header, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(body_limit(max_upload_bytes)))
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_leaves_room_for_uploads() {
        assert_eq!(body_limit(0), MIN_BODY_LIMIT + MULTIPART_OVERHEAD);
        let five_mib = 5 * 1024 * 1024;
        assert!(body_limit(five_mib) > five_mib);
    }

    #[test]
    fn request_id_falls_back_to_dash() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(request_id(&request), "-");

        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(())
            .unwrap();
        assert_eq!(request_id(&request), "abc-123");
    }
}
