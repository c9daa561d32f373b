//! HTTP middleware

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::handlers::images::CACHE_HEADER;

/// One access log line per request.
///
/// Lookups carry the `x-cache` status their handler set. Missing assets and
/// unknown nicknames are routine and stay at debug level.
pub async fn access_log_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let span = info_span!(
        "http",
        method = %request.method(),
        path = %request.uri().path()
    );

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let cache = response
        .headers()
        .get(CACHE_HEADER)
        .and_then(|value| value.to_str().ok());

    let _entered = span.enter();
    match (status, cache) {
        (status, _) if status.is_server_error() => {
            error!(status = status.as_u16(), elapsed_ms, "Request failed")
        }
        (status, Some(cache)) => {
            info!(status = status.as_u16(), cache, elapsed_ms, "Image lookup served")
        }
        (status, None) if status == StatusCode::ACCEPTED => {
            info!(status = status.as_u16(), elapsed_ms, "Upload accepted")
        }
        (status, None) if status == StatusCode::NOT_FOUND => {
            debug!(status = status.as_u16(), elapsed_ms, "Nothing found")
        }
        (status, None) if status.is_client_error() => {
            warn!(status = status.as_u16(), elapsed_ms, "Request rejected")
        }
        (status, None) => debug!(status = status.as_u16(), elapsed_ms, "Request served"),
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::HeaderName, routing::get};
    use axum_test::TestServer;

    fn router() -> Router {
        Router::new()
            .route(
                "/images/{nickname}",
                get(|| async { ([(HeaderName::from_static(CACHE_HEADER), "HIT")], "[]") }),
            )
            .route("/", axum::routing::post(|| async { StatusCode::ACCEPTED }))
            .route(
                "/boom",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .layer(axum::middleware::from_fn(access_log_middleware))
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_lookup_is_logged_with_cache_status() {
        let server = TestServer::new(router()).unwrap();

        server.get("/images/cat").await.assert_status_ok();

        assert!(logs_contain("Image lookup served"));
        assert!(logs_contain("HIT"));
        assert!(logs_contain("/images/cat"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_uploads_and_failures_are_logged() {
        let server = TestServer::new(router()).unwrap();

        server.post("/").await.assert_status(StatusCode::ACCEPTED);
        server
            .get("/boom")
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        assert!(logs_contain("Upload accepted"));
        assert!(logs_contain("Request failed"));
    }
}
