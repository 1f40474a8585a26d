use crate::loan::ResponseEnvelope;
use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::error;

const FAULT_MESSAGE: &str = "Sorry, nothing to see here, just a 500...";
const UNANSWERED_MESSAGE: &str = "Sorry, this page is still being built...";

// Replacement bodies are tiny; anything beyond this is passed through as-is.
const BODY_INSPECT_LIMIT: usize = 64 * 1024;

/// Safety net wrapped around every route: a panicking handler still yields
/// exactly one JSON envelope, and a 500 that carried no JSON body is replaced
/// by a generic envelope so the caller is never left without one.
pub async fn recover_faults(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => ensure_json_answer(response).await,
        Err(panic) => fault_response(panic_description(panic.as_ref())),
    }
}

fn panic_description(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "opaque panic payload"
    }
}

fn fault_response(description: &str) -> Response {
    error!(description, "request handler panicked");

    // Historical quirk kept for caller compatibility: a fault description
    // mentioning "502" is treated as an upstream failure.
    let status = if description.contains("502") {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let envelope = ResponseEnvelope::rejected(FAULT_MESSAGE, status.as_u16());
    (status, axum::Json(envelope)).into_response()
}

async fn ensure_json_answer(response: Response) -> Response {
    if response.status() != StatusCode::INTERNAL_SERVER_ERROR {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, BODY_INSPECT_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => return unanswered_response(),
    };

    let declared_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if declared_json && serde_json::from_slice::<serde_json::Value>(&bytes).is_ok() {
        return Response::from_parts(parts, Body::from(bytes));
    }

    unanswered_response()
}

fn unanswered_response() -> Response {
    let envelope = ResponseEnvelope::rejected(UNANSWERED_MESSAGE, 500);
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(envelope)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    fn wrapped(router: Router) -> Router {
        router.layer(axum::middleware::from_fn(recover_faults))
    }

    async fn read_json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), 1024).await.expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    async fn get_response(router: Router, uri: &str) -> Response {
        router
            .oneshot(
                axum::http::Request::get(uri)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes")
    }

    async fn panic_template_cache() {
        panic!("template cache corrupted");
    }

    async fn panic_upstream_502() {
        panic!("upstream replied 502");
    }

    #[tokio::test]
    async fn panicking_handler_yields_a_single_json_envelope() {
        let router = wrapped(Router::new().route(
            "/boom",
            get(panic_template_cache),
        ));

        let response = get_response(router, "/boom").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let payload = read_json_body(response).await;
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"], FAULT_MESSAGE);
        assert_eq!(payload["error_code"], 500);
    }

    #[tokio::test]
    async fn panic_mentioning_502_escalates_to_bad_gateway() {
        let router = wrapped(Router::new().route(
            "/boom",
            get(panic_upstream_502),
        ));

        let response = get_response(router, "/boom").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let payload = read_json_body(response).await;
        assert_eq!(payload["error_code"], 502);
    }

    #[tokio::test]
    async fn bare_500_is_replaced_by_the_fallback_envelope() {
        let router = wrapped(Router::new().route(
            "/half-built",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "oops") }),
        ));

        let response = get_response(router, "/half-built").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let payload = read_json_body(response).await;
        assert_eq!(payload["error"], UNANSWERED_MESSAGE);
        assert_eq!(payload["error_code"], 500);
    }

    #[tokio::test]
    async fn json_500_passes_through_untouched() {
        let router = wrapped(Router::new().route(
            "/typed",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "detail": "typed failure" })),
                )
            }),
        ));

        let response = get_response(router, "/typed").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let payload = read_json_body(response).await;
        assert_eq!(payload["detail"], "typed failure");
    }

    #[tokio::test]
    async fn healthy_responses_are_untouched() {
        let router = wrapped(Router::new().route("/ok", get(|| async { "fine" })));

        let response = get_response(router, "/ok").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024).await.expect("read body");
        assert_eq!(&body[..], b"fine");
    }
}
