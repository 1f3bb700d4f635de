//! HTTP boundary of the gateway.
//!
//! # Data Flow
//! ```text
//! Trigger listener (any method, any path)
//!     → gateway.rs (buffer body, build Trigger)
//!     → pool::WorkerPool::select
//!     → worker::Worker::handle
//!     → gateway.rs (write HttpResponse / event acknowledgement)
//!
//! Worker listener
//!     → worker_socket.rs (WebSocket upgrade, registration metadata)
//!     → pool::WorkerPool::attach
//! ```
//!
//! # Design Decisions
//! - Triggers and workers use separate listeners so the worker side can
//!   stay on a private interface
//! - The two routers share one `WorkerPool`

pub mod gateway;
pub mod server;
pub mod worker_socket;

pub use gateway::GatewayState;
pub use server::Server;
