//! Function-as-a-service gateway.
//!
//! Accepts HTTP requests and events on one listener and forwards each to
//! a connected function worker over a persistent bidirectional stream,
//! correlating replies by id so many requests can be in flight per worker.
//!
//! # Architecture Overview
//!
//! ```text
//!     Caller                       ┌────────────────────────────────────────────┐
//!     ─────────── HTTP / event ───▶│ http::gateway ──▶ pool ──▶ worker::Worker  │
//!                                  │        ▲                        │          │
//!     ◀────────── response ────────│────────┘                 ticket table      │
//!                                  │                                 │          │
//!                                  │ http::worker_socket ◀── WebSocket stream ──┼──▶ Function
//!                                  │                                            │    worker
//!                                  │  config · observability · lifecycle        │
//!                                  └────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod http;
pub mod pool;
pub mod protocol;
pub mod triggers;
pub mod worker;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::DispatchError;
pub use http::Server;
pub use lifecycle::Shutdown;
pub use pool::WorkerPool;
pub use worker::{Registration, Worker};
