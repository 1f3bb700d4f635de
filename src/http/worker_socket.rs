//! Worker registration endpoint.
//!
//! # Data Flow
//! ```text
//! GET /workers/connect?kind=route&path=/items/:id&methods=GET,POST
//!     → WebSocket upgrade
//!     → writer task: ServerMessage → JSON text frame
//!     → reader: text/binary frame → WorkerMessage
//!     → WorkerPool::attach (registered until the socket ends)
//! ```
//!
//! # Design Decisions
//! - Registration metadata is fixed at connect time via query parameters
//! - Ping/pong is handled by the WebSocket layer; control frames are skipped
//! - A close frame ends the stream like a disconnect

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::error::DispatchError;
use crate::pool::WorkerPool;
use crate::protocol::{ServerMessage, WorkerMessage};
use crate::worker::{DescriptorError, Registration, RouteDescriptor, StreamError, WorkerConnection};

/// Query parameters of the connect request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConnectParams {
    pub kind: WorkerKind,
    pub path: Option<String>,
    /// Comma-separated; empty accepts any method.
    pub methods: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    #[default]
    Route,
    Subscription,
}

impl ConnectParams {
    pub fn into_registration(self) -> Result<Registration, DescriptorError> {
        match self.kind {
            WorkerKind::Route => {
                let path = self.path.ok_or(DescriptorError::MissingPath)?;
                let methods = self.methods.unwrap_or_default();
                let methods = methods
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty());
                Ok(Registration::Route(RouteDescriptor::new(methods, &path)?))
            }
            WorkerKind::Subscription => Ok(Registration::Subscription {
                topic: self.topic.filter(|t| !t.is_empty()),
            }),
        }
    }
}

/// Build the worker-facing router.
pub fn router(pool: Arc<WorkerPool>) -> Router {
    Router::new()
        .route("/workers/connect", get(connect_handler))
        .route("/workers", get(list_handler))
        .with_state(pool)
        .layer(TraceLayer::new_for_http())
}

async fn connect_handler(
    State(pool): State<Arc<WorkerPool>>,
    Query(params): Query<ConnectParams>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let registration = match params.into_registration() {
        Ok(registration) => registration,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected worker registration");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    upgrade.on_upgrade(move |socket| serve_socket(pool, registration, socket))
}

async fn list_handler(State(pool): State<Arc<WorkerPool>>) -> impl IntoResponse {
    Json(pool.snapshot())
}

/// Serve one worker socket until it ends.
async fn serve_socket(pool: Arc<WorkerPool>, registration: Registration, socket: WebSocket) {
    let (sink, source) = socket.split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection = Arc::new(WorkerConnection::new(outbound));
    let writer = tokio::spawn(write_frames(connection.clone(), outbound_rx, sink));

    let worker = registration.into_worker(connection);
    let _ = pool.attach(worker, decode_frames(source)).await;

    writer.abort();
}

/// Drain the connection's outbound queue into the socket as JSON text
/// frames. A message that cannot be delivered closes the connection, so
/// the caller waiting on it is released.
async fn write_frames<S>(
    connection: Arc<WorkerConnection>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    mut sink: S,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        let frame = match serde_json::to_string(&message) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => {
                tracing::error!(worker_id = %connection.id(), error = %e, "Failed to encode server message");
                connection.close(DispatchError::Dispatch(format!("encode failed: {}", e)));
                break;
            }
        };
        if let Err(e) = sink.send(frame).await {
            tracing::debug!(worker_id = %connection.id(), error = %e, "Worker socket write failed");
            connection.close(DispatchError::Dispatch(format!("write failed: {}", e)));
            break;
        }
    }
    let _ = sink.close().await;
}

/// Turn raw WebSocket frames into protocol messages.
fn decode_frames<S>(
    frames: S,
) -> impl Stream<Item = Result<WorkerMessage, StreamError>> + Send
where
    S: Stream<Item = Result<Message, axum::Error>> + Send,
{
    frames
        .take_while(|frame| std::future::ready(!matches!(frame, Ok(Message::Close(_)))))
        .filter_map(|frame| {
            let item = match frame {
                Ok(Message::Text(text)) => Some(decode(text.as_str().as_bytes())),
                Ok(Message::Binary(bytes)) => Some(decode(&bytes)),
                Ok(_) => None,
                Err(e) => Some(Err(StreamError::Transport(e.to_string()))),
            };
            std::future::ready(item)
        })
}

fn decode(bytes: &[u8]) -> Result<WorkerMessage, StreamError> {
    serde_json::from_slice(bytes).map_err(|e| StreamError::Decode(e.to_string()))
}
