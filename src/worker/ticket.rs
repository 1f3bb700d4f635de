//! Correlation tickets.
//!
//! # Responsibilities
//! - Allocate a unique correlation id and a single-use reply slot
//! - Resolve a ticket exactly once when its reply arrives
//! - Release tickets on every exit path (send failure, caller gone,
//!   connection teardown)
//! - Tell a late reply for an abandoned ticket apart from an id that was
//!   never issued
//!
//! # Design Decisions
//! - Pending entries live in a sharded map; insert-if-vacant and remove are
//!   each atomic, so allocation and resolution never race
//! - A [`Ticket`] dropped before its reply leaves an abandoned marker; the
//!   worker may still answer, and that reply is discarded. Entries carry a
//!   sequence number so a stale ticket never marks a later ticket that
//!   reused its id
//! - Tearing down the table drops every reply sender, which wakes each
//!   waiting caller with [`DispatchError::WorkerDisconnected`]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::protocol::TriggerReply;

/// Allocation attempted with an id that is still pending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("correlation id {0} is already pending")]
pub struct DuplicateTicket(pub String);

/// Resolution attempted for an id that is not pending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no pending ticket for correlation id {0}")]
pub struct UnknownTicket(pub String);

#[derive(Debug)]
struct Pending {
    seq: u64,
    /// `None` once the caller has gone away.
    slot: Option<oneshot::Sender<TriggerReply>>,
}

/// What happened to a reply handed to [`TicketTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Delivered,
    /// The caller abandoned the ticket; the reply was dropped.
    Discarded,
}

/// Pending tickets of one worker connection.
#[derive(Debug, Default)]
pub struct TicketTable {
    pending: DashMap<String, Pending>,
    next_seq: AtomicU64,
}

impl TicketTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allocate a ticket under a fresh random id.
    pub fn allocate(self: &Arc<Self>) -> Ticket {
        loop {
            // A v4 collision with a pending id is practically impossible,
            // but the table invariant must hold regardless.
            if let Ok(ticket) = self.allocate_with_id(uuid::Uuid::new_v4().to_string()) {
                return ticket;
            }
        }
    }

    /// Allocate a ticket under `id`. Fails if `id` is already pending.
    pub fn allocate_with_id(
        self: &Arc<Self>,
        id: impl Into<String>,
    ) -> Result<Ticket, DuplicateTicket> {
        let id = id.into();
        match self.pending.entry(id.clone()) {
            Entry::Occupied(_) => Err(DuplicateTicket(id)),
            Entry::Vacant(entry) => {
                let (slot, reply) = oneshot::channel();
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                entry.insert(Pending {
                    seq,
                    slot: Some(slot),
                });
                Ok(Ticket {
                    id,
                    seq,
                    reply,
                    table: Arc::clone(self),
                })
            }
        }
    }

    /// Remove the entry for `id` and deliver `reply` to its caller.
    ///
    /// Fails only for ids that are not in the table at all. A reply for an
    /// abandoned ticket is discarded.
    pub fn resolve(&self, id: &str, reply: TriggerReply) -> Result<Resolution, UnknownTicket> {
        let (_, pending) = self
            .pending
            .remove(id)
            .ok_or_else(|| UnknownTicket(id.to_string()))?;
        match pending.slot.map(|slot| slot.send(reply)) {
            Some(Ok(())) => Ok(Resolution::Delivered),
            _ => {
                tracing::debug!(correlation_id = %id, "Reply arrived after caller went away");
                Ok(Resolution::Discarded)
            }
        }
    }

    /// Drop every entry, waking waiting callers. Returns how many callers
    /// were still waiting.
    pub fn release_all(&self) -> usize {
        let released = self.len();
        self.pending.clear();
        released
    }

    /// Is a caller still waiting on `id`?
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending
            .get(id)
            .is_some_and(|pending| pending.slot.is_some())
    }

    /// Number of callers still waiting.
    pub fn len(&self) -> usize {
        self.pending.iter().filter(|p| p.slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tickets whose caller went away before the reply arrived.
    pub fn abandoned(&self) -> usize {
        self.pending.iter().filter(|p| p.slot.is_none()).count()
    }

    fn abandon(&self, id: &str, seq: u64) {
        if let Some(mut pending) = self.pending.get_mut(id) {
            if pending.seq == seq {
                pending.slot = None;
            }
        }
    }
}

/// A pending request/response correlation.
#[derive(Debug)]
pub struct Ticket {
    id: String,
    seq: u64,
    reply: oneshot::Receiver<TriggerReply>,
    table: Arc<TicketTable>,
}

impl Ticket {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the reply. Suspends only the calling task.
    pub async fn wait(mut self) -> Result<TriggerReply, DispatchError> {
        (&mut self.reply)
            .await
            .map_err(|_| DispatchError::WorkerDisconnected)
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        // No-op when the entry was already resolved or released
        self.table.abandon(&self.id, self.seq);
    }
}
