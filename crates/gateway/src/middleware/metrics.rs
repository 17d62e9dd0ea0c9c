//! Per-request metrics middleware

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use papervault_common::metrics::RequestMetrics;

/// Record count and latency of every routed request, labelled by route template
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let tracker = RequestMetrics::start(request.method().as_str(), &endpoint);
    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());

    response
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_tracked_route_passes_through() {
        let app = test_app();
        let response = get(&app.router, "/paper/7").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
