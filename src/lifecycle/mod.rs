//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics exporter → Bind listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close workers → Drain gateway requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners bind before serving so port errors surface immediately
//! - Worker streams are not drained: shutdown closes every worker, so
//!   callers still waiting on one get an error instead of blocking the exit

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
