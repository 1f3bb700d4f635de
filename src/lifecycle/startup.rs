//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize the metrics exporter when enabled
//! - Bind both listeners
//! - Install the signal handler and run the server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::Server;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid {field} {value:?}")]
    Address { field: &'static str, value: String },
    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the gateway until a shutdown signal arrives.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = parse_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
        )?;
        metrics::init_metrics(addr)?;
    }

    let gateway_listener = bind(&config.gateway.bind_address).await?;
    let worker_listener = bind(&config.workers.bind_address).await?;

    tracing::info!(
        max_body_bytes = config.gateway.max_body_bytes,
        request_timeout_secs = config.gateway.request_timeout_secs,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    Server::new(config)
        .run(gateway_listener, worker_listener, shutdown)
        .await?;
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

fn parse_address(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::Address {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_failure_names_address() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let error = bind(&address).await.unwrap_err();
        assert!(error.to_string().contains(&address));
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("x", "127.0.0.1:9090").is_ok());
        assert!(matches!(
            parse_address("x", "nowhere"),
            Err(StartupError::Address { field: "x", .. })
        ));
    }
}
