//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the gateway and worker routers around one shared pool
//! - Serve both listeners until shutdown
//! - Drain in-flight requests on graceful shutdown
//!
//! # Design Decisions
//! - Upgraded worker sockets outlive the listener's graceful shutdown, so
//!   on shutdown every worker is closed explicitly. That releases callers
//!   still waiting on a worker and lets the gateway drain finish

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::error::DispatchError;
use crate::http::{gateway, worker_socket};
use crate::lifecycle::Shutdown;
use crate::pool::WorkerPool;

/// Gateway server: the trigger listener plus the worker listener.
pub struct Server {
    config: GatewayConfig,
    pool: Arc<WorkerPool>,
}

impl Server {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            pool: Arc::new(WorkerPool::new()),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn gateway_router(&self) -> Router {
        gateway::router(gateway::GatewayState {
            pool: self.pool.clone(),
            max_body_bytes: self.config.gateway.max_body_bytes,
            request_timeout: self.config.gateway.request_timeout(),
        })
    }

    pub fn worker_router(&self) -> Router {
        worker_socket::router(self.pool.clone())
    }

    /// Serve both listeners until `shutdown` fires or one of them fails.
    pub async fn run(
        self,
        gateway_listener: TcpListener,
        worker_listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            gateway = %gateway_listener.local_addr()?,
            workers = %worker_listener.local_addr()?,
            "Server starting"
        );

        let gateway = axum::serve(gateway_listener, self.gateway_router())
            .with_graceful_shutdown({
                let shutdown = shutdown.clone();
                async move { shutdown.wait().await }
            });
        let workers = axum::serve(worker_listener, self.worker_router())
            .with_graceful_shutdown({
                let shutdown = shutdown.clone();
                async move { shutdown.wait().await }
            });

        let close_workers = {
            let pool = self.pool.clone();
            let shutdown = shutdown.clone();
            async move {
                shutdown.wait().await;
                let closed = pool.close_all(DispatchError::WorkerDisconnected);
                tracing::info!(closed_workers = closed, "Closed worker connections");
                Ok::<(), std::io::Error>(())
            }
        };

        let result = tokio::try_join!(
            async { gateway.await },
            async { workers.await },
            close_workers,
        );
        // One listener failing takes the other down with it
        shutdown.trigger();

        result?;
        tracing::info!("Server stopped");
        Ok(())
    }
}
