use crate::loan::{self, LoanRequest, ResponseEnvelope};
use crate::middleware::recover_faults;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared process-wide state: the form page read at startup, the readiness
/// flag flipped once the listener is bound, and the metrics handle. All
/// read-only or monotonic after startup.
#[derive(Clone)]
pub struct AppState {
    pub template: Arc<String>,
    pub readiness: Arc<AtomicBool>,
    pub metrics: PrometheusHandle,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            "/calculate",
            post(calculate_endpoint).fallback(method_not_allowed),
        )
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(axum::middleware::from_fn(recover_faults))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html((*state.template).clone())
}

/// The single calculation endpoint: parse, validate, divide, envelope. A body
/// the form extractor cannot read is treated as empty fields, which the
/// numeric parse then rejects.
pub async fn calculate_endpoint(form: Result<Form<LoanRequest>, FormRejection>) -> Response {
    let request = form.map(|Form(request)| request).unwrap_or_default();

    let envelope = match loan::validate(&request) {
        Ok(validated) => ResponseEnvelope::created(validated.monthly_payment()),
        Err(rejection) => ResponseEnvelope::from(rejection),
    };

    envelope_response(envelope)
}

pub async fn method_not_allowed() -> Response {
    envelope_response(ResponseEnvelope::rejected("Method not allowed", 405))
}

/// Failure envelopes mirror their error code in the HTTP status; success is
/// left at the transport default 200.
fn envelope_response(envelope: ResponseEnvelope) -> Response {
    let status = envelope
        .error_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    (status, Json(envelope)).into_response()
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
