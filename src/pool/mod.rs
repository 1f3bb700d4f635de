//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Worker stream established
//!     → registry.rs attach(): add worker, run its listen loop
//!     → loop ends (peer close, stream error, protocol violation)
//!     → worker removed
//!
//! Trigger arrives
//!     → registry.rs select(): first registered worker that matches
//!     → Return worker or NoWorkerAvailable
//! ```
//!
//! # Design Decisions
//! - First match wins, in registration order; route specificity is the
//!   registrant's responsibility
//! - Registry changes and selection serialize on one lock
//! - No retries, no load heuristics

pub mod registry;

pub use registry::WorkerPool;
