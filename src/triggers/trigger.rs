//! Inbound trigger normalization.
//!
//! # Responsibilities
//! - Classify a wire request as HTTP or event from the source type header
//! - Capture method, path, headers, query and body for HTTP triggers
//! - Capture id, topic and payload for event triggers
//! - Resolve the content type of HTTP bodies
//!
//! # Design Decisions
//! - Missing or unknown source type defaults to HTTP
//! - Header names are lower-cased; values that are not valid UTF-8 are
//!   converted lossily
//! - Fields are private; a trigger is read-only once built

use axum::http::{request::Parts, HeaderMap};
use bytes::Bytes;

use crate::triggers::{content_type, MultiMap};

/// Names the trigger kind of an inbound request.
pub const SOURCE_TYPE_HEADER: &str = "x-faas-source-type";

/// Topic (or other source identifier) of an event trigger.
pub const SOURCE_HEADER: &str = "x-faas-source";

/// Request id, used as the id of event triggers.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Kind of an inbound trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Http,
    Event,
}

impl TriggerKind {
    /// Classify from the source type header. Absence means HTTP.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get(SOURCE_TYPE_HEADER).and_then(|v| v.to_str().ok()) {
            Some(value)
                if value.eq_ignore_ascii_case("subscription")
                    || value.eq_ignore_ascii_case("event") =>
            {
                TriggerKind::Event
            }
            _ => TriggerKind::Http,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Http => "http",
            TriggerKind::Event => "event",
        }
    }
}

/// An HTTP call to be served by a route worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTrigger {
    method: String,
    path: String,
    headers: MultiMap,
    query: MultiMap,
    body: Bytes,
}

impl HttpTrigger {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: MultiMap::new(),
            query: MultiMap::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header value. Names are lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &MultiMap {
        &self.headers
    }

    pub fn query(&self) -> &MultiMap {
        &self.query
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The explicit `content-type` header if set, otherwise a type sniffed
    /// from the body.
    pub fn content_type(&self) -> String {
        self.headers
            .get("content-type")
            .and_then(|values| values.first())
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| content_type::sniff(&self.body).to_string())
    }
}

/// A pub/sub style event delivered to a subscription worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTrigger {
    id: String,
    topic: String,
    payload: Bytes,
}

impl EventTrigger {
    pub fn new(id: impl Into<String>, topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// A normalized inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Http(HttpTrigger),
    Event(EventTrigger),
}

impl Trigger {
    /// Build a trigger from the head of a wire request and its buffered body.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        match TriggerKind::from_headers(&parts.headers) {
            TriggerKind::Event => Trigger::Event(EventTrigger {
                id: header_str(&parts.headers, REQUEST_ID_HEADER),
                topic: header_str(&parts.headers, SOURCE_HEADER),
                payload: body,
            }),
            TriggerKind::Http => Trigger::Http(HttpTrigger {
                method: parts.method.as_str().to_string(),
                path: parts.uri.path().to_string(),
                headers: header_multimap(&parts.headers),
                query: parts.uri.query().map(query_multimap).unwrap_or_default(),
                body,
            }),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Http(_) => TriggerKind::Http,
            Trigger::Event(_) => TriggerKind::Event,
        }
    }
}

impl From<HttpTrigger> for Trigger {
    fn from(trigger: HttpTrigger) -> Self {
        Trigger::Http(trigger)
    }
}

impl From<EventTrigger> for Trigger {
    fn from(trigger: EventTrigger) -> Self {
        Trigger::Event(trigger)
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn header_multimap(headers: &HeaderMap) -> MultiMap {
    let mut map = MultiMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

fn query_multimap(query: &str) -> MultiMap {
    let mut map = MultiMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        map.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_http_trigger_from_parts() {
        let head = parts(
            Request::builder()
                .method("POST")
                .uri("http://localhost/orders/42?tag=a&tag=b&q=hello%20world")
                .header("Content-Type", "application/json")
                .header("X-Trace", "1")
                .header("X-Trace", "2")
                .body(())
                .unwrap(),
        );

        let trigger = Trigger::from_parts(&head, Bytes::from_static(b"{}"));
        let Trigger::Http(http) = trigger else {
            panic!("expected an http trigger");
        };

        assert_eq!(http.method(), "POST");
        assert_eq!(http.path(), "/orders/42");
        assert_eq!(http.headers()["x-trace"], vec!["1", "2"]);
        assert_eq!(http.query()["tag"], vec!["a", "b"]);
        assert_eq!(http.query()["q"], vec!["hello world"]);
        assert_eq!(http.body().as_ref(), b"{}");
        assert_eq!(http.content_type(), "application/json");
    }

    #[test]
    fn test_event_trigger_from_parts() {
        let head = parts(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(SOURCE_TYPE_HEADER, "Subscription")
                .header(SOURCE_HEADER, "orders")
                .header(REQUEST_ID_HEADER, "req-1")
                .body(())
                .unwrap(),
        );

        let trigger = Trigger::from_parts(&head, Bytes::from_static(b"payload"));
        assert_eq!(trigger.kind(), TriggerKind::Event);
        assert_eq!(
            trigger,
            Trigger::Event(EventTrigger::new("req-1", "orders", &b"payload"[..]))
        );
    }

    #[test]
    fn test_unknown_source_type_defaults_to_http() {
        let head = parts(
            Request::builder()
                .uri("/")
                .header(SOURCE_TYPE_HEADER, "carrier-pigeon")
                .body(())
                .unwrap(),
        );
        assert_eq!(Trigger::from_parts(&head, Bytes::new()).kind(), TriggerKind::Http);
    }

    #[test]
    fn test_content_type_sniffed_without_header() {
        let trigger = HttpTrigger::new("POST", "/").with_body(&b"%PDF-1.4"[..]);
        assert_eq!(trigger.content_type(), "application/pdf");

        let empty_header = HttpTrigger::new("POST", "/")
            .with_header("content-type", "")
            .with_body(&b"plain words"[..]);
        assert_eq!(empty_header.content_type(), content_type::TEXT_PLAIN);
    }
}
