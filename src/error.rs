//! Dispatch error taxonomy.
//!
//! Every error that can end an in-flight trigger. None of them are retried;
//! `Dispatch` and `ProtocolViolation` additionally tear the offending worker
//! down.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No registered worker matches the trigger.
    #[error("no worker available to handle this trigger")]
    NoWorkerAvailable,

    /// The trigger could not be written to the worker's stream.
    #[error("failed to dispatch trigger to worker: {0}")]
    Dispatch(String),

    /// Reply tagged with an unknown correlation id, or a reply whose payload
    /// does not fit the trigger kind.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The worker's connection ended while the ticket was pending.
    #[error("worker disconnected before responding")]
    WorkerDisconnected,

    /// The caller-side deadline elapsed.
    #[error("worker did not respond within {0:?}")]
    UpstreamUnresponsive(Duration),

    /// The worker's stream failed to read.
    #[error("worker stream failed: {0}")]
    Stream(String),

    /// The selected worker kind cannot serve this trigger kind.
    #[error("{0}")]
    Unsupported(&'static str),
}

impl DispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NoWorkerAvailable => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::UpstreamUnresponsive(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
