//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Worker id and correlation id are carried as structured fields
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
