//! Envelope types and their JSON encoding.

use serde::{Deserialize, Serialize};

use crate::triggers::MultiMap;

/// Message sent from the server to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Correlation id. Absent for the handshake acknowledgement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: ServerContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerContent {
    InitResponse(InitResponse),
    TriggerRequest(TriggerRequest),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {}

/// A trigger forwarded to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub context: TriggerContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerContext {
    Http(HttpContext),
    Topic(TopicContext),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpContext {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: MultiMap,
    #[serde(default)]
    pub query_params: MultiMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicContext {
    pub id: String,
    pub topic: String,
}

/// Message sent from a worker to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMessage {
    /// Correlation id of the request being answered. Absent for the
    /// handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: WorkerContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerContent {
    InitRequest(InitRequest),
    TriggerResponse(TriggerReply),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {}

/// A worker's answer to a [`TriggerRequest`].
///
/// `context` is optional on the wire so that a reply missing it can be
/// reported as a protocol violation rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerReply {
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ReplyContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyContext {
    Http(HttpReplyContext),
    Topic(TopicReplyContext),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpReplyContext {
    pub status: u16,
    #[serde(default)]
    pub headers: MultiMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicReplyContext {
    pub success: bool,
}

impl ServerMessage {
    pub fn init_response() -> Self {
        Self {
            id: None,
            content: ServerContent::InitResponse(InitResponse {}),
        }
    }

    pub fn trigger_request(id: impl Into<String>, request: TriggerRequest) -> Self {
        Self {
            id: Some(id.into()),
            content: ServerContent::TriggerRequest(request),
        }
    }
}

impl WorkerMessage {
    pub fn init_request() -> Self {
        Self {
            id: None,
            content: WorkerContent::InitRequest(InitRequest {}),
        }
    }

    pub fn reply(id: impl Into<String>, reply: TriggerReply) -> Self {
        Self {
            id: Some(id.into()),
            content: WorkerContent::TriggerResponse(reply),
        }
    }
}

impl TriggerReply {
    pub fn http(status: u16, headers: MultiMap, data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            context: Some(ReplyContext::Http(HttpReplyContext { status, headers })),
        }
    }

    pub fn topic(success: bool) -> Self {
        Self {
            data: Vec::new(),
            context: Some(ReplyContext::Topic(TopicReplyContext { success })),
        }
    }
}
