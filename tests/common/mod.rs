//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use faas_gateway::protocol::{
    ServerContent, ServerMessage, TriggerRequest, TriggerReply, WorkerMessage,
};
use faas_gateway::{GatewayConfig, Server, Shutdown, WorkerPool};

/// A gateway running on ephemeral ports.
pub struct TestGateway {
    pub gateway_addr: SocketAddr,
    pub worker_addr: SocketAddr,
    pub pool: Arc<WorkerPool>,
    pub shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub async fn start() -> Self {
        Self::start_with(GatewayConfig::default()).await
    }

    pub async fn start_with(config: GatewayConfig) -> Self {
        let gateway_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let worker_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let gateway_addr = gateway_listener.local_addr().unwrap();
        let worker_addr = worker_listener.local_addr().unwrap();

        let server = Server::new(config);
        let pool = server.pool().clone();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(server.run(gateway_listener, worker_listener, shutdown.clone()));

        Self {
            gateway_addr,
            worker_addr,
            pool,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.gateway_addr, path)
    }

    pub fn connect_url(&self, query: &str) -> String {
        format!("ws://{}/workers/connect?{}", self.worker_addr, query)
    }

    /// Wait until the pool holds exactly `count` workers.
    pub async fn wait_for_workers(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.pool.len() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("pool never reached {} workers", count));
    }

    /// Trigger shutdown and wait for the server to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop after shutdown")
            .unwrap()
            .unwrap();
    }

    /// Wait until the first registered worker has `count` pending callers.
    pub async fn wait_for_pending(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.pool.snapshot().first().map(|w| w.pending) != Some(count) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("worker never reached {} pending callers", count));
    }
}

/// Reply produced by a mock worker. `None` leaves the request unanswered.
pub type Handler = Arc<dyn Fn(&str, &TriggerRequest) -> Option<WorkerMessage> + Send + Sync>;

pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&str, &TriggerRequest) -> Option<WorkerMessage> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Echo the request body back with status 200 and its content type.
pub fn echo_handler() -> Handler {
    handler(|id, request| {
        let headers = [(
            "content-type".to_string(),
            vec![request.mime_type.clone()],
        )]
        .into_iter()
        .collect();
        Some(WorkerMessage::reply(
            id,
            TriggerReply::http(200, headers, request.data.clone()),
        ))
    })
}

/// A worker connected over WebSocket, answering with `handler`.
pub struct MockWorker {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl MockWorker {
    pub async fn connect(url: &str, handler: Handler) -> Self {
        Self::connect_delayed(url, |_| Duration::ZERO, handler).await
    }

    /// Like `connect`, but each reply is held back for `delay(request)`.
    pub async fn connect_delayed<D>(url: &str, delay: D, handler: Handler) -> Self
    where
        D: Fn(&TriggerRequest) -> Duration + Send + Sync + 'static,
    {
        let (socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let (mut sink, mut source) = socket.split();

        let init = serde_json::to_string(&WorkerMessage::init_request()).unwrap();
        sink.send(Message::text(init)).await.unwrap();

        let (replies, mut replies_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(json) = replies_rx.recv().await {
                if sink.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(Ok(frame)) = source.next().await {
                let Message::Text(text) = frame else { continue };
                let Ok(message) = serde_json::from_str::<ServerMessage>(text.as_str()) else {
                    continue;
                };
                let (Some(id), ServerContent::TriggerRequest(request)) =
                    (message.id, message.content)
                else {
                    continue;
                };
                let Some(reply) = handler(&id, &request) else {
                    continue;
                };
                let json = serde_json::to_string(&reply).unwrap();
                let wait = delay(&request);
                if wait.is_zero() {
                    let _ = replies.send(json);
                } else {
                    let replies = replies.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(wait).await;
                        let _ = replies.send(json);
                    });
                }
            }
        });

        Self { reader, writer }
    }

    /// Drop the connection without a close handshake.
    pub fn disconnect(self) {
        self.reader.abort();
        self.writer.abort();
    }
}
