//! Responses produced by workers.

use bytes::Bytes;

use crate::triggers::MultiMap;

/// Outcome of an HTTP trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: MultiMap,
    pub body: Bytes,
}

/// Outcome of an event trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Http(HttpResponse),
    Event(EventResponse),
}
