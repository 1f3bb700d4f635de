//! Trigger model.
//!
//! # Data Flow
//! ```text
//! Inbound wire request (method, uri, headers, body)
//!     → trigger.rs (classify HTTP vs event, build Trigger)
//!     → content_type.rs (resolve mime type for HTTP bodies)
//!     → [worker pool selects a worker]
//!     → response.rs (Response produced by the worker)
//! ```
//!
//! # Design Decisions
//! - Triggers are built once per inbound request and never mutated
//! - Normalization is pure: no I/O, no shared state
//! - Multimaps are ordered so wire encoding is deterministic

use std::collections::BTreeMap;

pub mod content_type;
pub mod response;
pub mod trigger;

pub use response::{EventResponse, HttpResponse, Response};
pub use trigger::{
    EventTrigger, HttpTrigger, Trigger, TriggerKind, REQUEST_ID_HEADER, SOURCE_HEADER,
    SOURCE_TYPE_HEADER,
};

/// Key to ordered list of values, used for headers and query parameters.
pub type MultiMap = BTreeMap<String, Vec<String>>;
