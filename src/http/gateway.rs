//! Gateway adapter: inbound wire requests in, worker responses out.
//!
//! # Responsibilities
//! - Buffer the request body and build a Trigger
//! - Select a worker from the pool and invoke it
//! - Serialize the worker's response back to the wire
//! - Map dispatch errors to status codes
//!
//! # Design Decisions
//! - Hop-by-hop headers from the worker (content-length, connection) are
//!   dropped; the server computes its own framing
//! - The optional deadline is applied here, around the worker call; the
//!   dispatch core itself never times out
//! - Event triggers are acknowledged with a plain-text status line

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response as WireResponse},
    routing::any,
    Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::error::DispatchError;
use crate::observability::metrics;
use crate::pool::WorkerPool;
use crate::triggers::{EventResponse, HttpResponse, Response, Trigger, TriggerKind};

/// Body returned for a successfully handled event.
pub const EVENT_HANDLED: &str = "Successfully Handled the Event";

/// Shared state injected into the gateway handler.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub pool: Arc<WorkerPool>,
    pub max_body_bytes: usize,
    /// Caller-side deadline for a worker to answer.
    pub request_timeout: Option<Duration>,
}

/// Build the gateway router. Every method and path is forwarded.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", any(gateway_handler))
        .route("/{*path}", any(gateway_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn gateway_handler(
    State(state): State<GatewayState>,
    request: Request<Body>,
) -> WireResponse {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, path = %parts.uri.path(), "Failed to buffer request body");
            let kind = TriggerKind::from_headers(&parts.headers);
            metrics::record_request(kind.as_str(), StatusCode::PAYLOAD_TOO_LARGE.as_u16(), start);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let trigger = Trigger::from_parts(&parts, body);
    tracing::debug!(
        kind = trigger.kind().as_str(),
        method = %parts.method,
        path = %parts.uri.path(),
        "Dispatching trigger"
    );

    let response = match dispatch(&state, &trigger).await {
        Ok(Response::Http(response)) => write_http_response(response),
        Ok(Response::Event(response)) => write_event_response(response),
        Err(e) => {
            match &e {
                DispatchError::NoWorkerAvailable => {
                    tracing::warn!(path = %parts.uri.path(), "No worker available")
                }
                _ => tracing::error!(error = %e, path = %parts.uri.path(), "Trigger failed"),
            }
            match trigger.kind() {
                TriggerKind::Event => (
                    e.status_code(),
                    format!("Error processing event. Details: {}", e),
                )
                    .into_response(),
                TriggerKind::Http => e.into_response(),
            }
        }
    };

    metrics::record_request(trigger.kind().as_str(), response.status().as_u16(), start);
    response
}

async fn dispatch(state: &GatewayState, trigger: &Trigger) -> Result<Response, DispatchError> {
    let worker = state.pool.select(trigger)?;
    match state.request_timeout {
        Some(limit) => tokio::time::timeout(limit, worker.handle(trigger))
            .await
            .map_err(|_| DispatchError::UpstreamUnresponsive(limit))?,
        None => worker.handle(trigger).await,
    }
}

fn write_http_response(response: HttpResponse) -> WireResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or_else(|_| {
        tracing::warn!(status = response.status, "Worker returned an invalid status code");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut headers = HeaderMap::new();
    for (name, values) in &response.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::debug!(header = %name, "Dropping invalid response header name");
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    strip_hop_by_hop(&mut headers);

    (status, headers, response.body).into_response()
}

fn write_event_response(response: EventResponse) -> WireResponse {
    if response.success {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            EVENT_HANDLED,
        )
            .into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error processing event. Details: worker reported failure",
        )
            .into_response()
    }
}

/// Remove headers describing the worker's own connection.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONNECTION);
}
