//! Worker stream protocol.
//!
//! Envelopes exchanged with a connected worker over its single duplex
//! stream. The server sends [`ServerMessage`]s and receives
//! [`WorkerMessage`]s; a trigger request and its reply carry the same
//! correlation id.
//!
//! ```text
//! worker ── InitRequest ─────────────────────▶ server   (no id)
//! worker ◀───────────────────── InitResponse ── server   (no id)
//! worker ◀──── TriggerRequest { id: "a" } ───── server
//! worker ◀──── TriggerRequest { id: "b" } ───── server
//! worker ── TriggerResponse { id: "b" } ─────▶ server   (any order)
//! worker ── TriggerResponse { id: "a" } ─────▶ server
//! ```

pub mod message;

pub use message::{
    HttpContext, HttpReplyContext, InitRequest, InitResponse, ReplyContext, ServerContent,
    ServerMessage, TopicContext, TopicReplyContext, TriggerContext, TriggerReply, TriggerRequest,
    WorkerContent, WorkerMessage,
};
