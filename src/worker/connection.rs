//! Worker connection: one duplex stream multiplexing many triggers.
//!
//! # Responsibilities
//! - Send trigger requests tagged with a correlation ticket
//! - Run the read loop that resolves tickets as replies arrive
//! - Acknowledge the worker's handshake
//! - Tear the connection down on stream end, send failure or protocol
//!   violation, releasing every pending ticket
//!
//! # Data Flow
//! ```text
//! call():   allocate ticket → outbound.send(request) → await ticket
//! listen(): inbound.next() → resolve ticket by id → wake exactly one caller
//! ```
//!
//! # Design Decisions
//! - Outbound messages go through an unbounded channel drained by the
//!   transport's writer task, so callers never wait on each other
//! - Replies are matched purely by correlation id; stream order is
//!   irrelevant
//! - A reply for a ticket whose caller gave up is dropped quietly; a reply
//!   for an id never issued means the table can no longer be trusted, and
//!   the loop stops instead of trying to recover
//! - The closed state is a watch channel holding the teardown reason, so a
//!   caller-side teardown also stops the read loop

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{pin_mut, Stream, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::error::DispatchError;
use crate::observability::metrics;
use crate::protocol::{ServerMessage, TriggerReply, TriggerRequest, WorkerContent, WorkerMessage};
use crate::worker::ticket::TicketTable;

static WORKER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connected worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    pub fn new() -> Self {
        Self(WORKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Failure reading the inbound half of a worker stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed message: {0}")]
    Decode(String),
}

/// Sending half of a worker stream.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
pub struct WorkerConnection {
    id: WorkerId,
    outbound: Outbound,
    tickets: Arc<TicketTable>,
    /// `Some(reason)` once torn down.
    closed: watch::Sender<Option<DispatchError>>,
}

impl WorkerConnection {
    pub fn new(outbound: Outbound) -> Self {
        let (closed, _) = watch::channel(None);
        Self {
            id: WorkerId::new(),
            outbound,
            tickets: TicketTable::new(),
            closed,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// Number of tickets awaiting a reply.
    pub fn pending(&self) -> usize {
        self.tickets.len()
    }

    /// Mark the connection closed and release all pending tickets.
    ///
    /// Only the first reason is kept; later calls are no-ops.
    pub fn close(&self, reason: DispatchError) {
        let first = self.closed.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(reason.clone());
            true
        });
        if !first {
            return;
        }
        let released = self.tickets.release_all();
        tracing::info!(
            worker_id = %self.id,
            reason = %reason,
            released_tickets = released,
            "Worker connection closed"
        );
    }

    /// Send `request` and wait for the reply carrying the same correlation
    /// id. Suspends only the calling task.
    pub async fn call(&self, request: TriggerRequest) -> Result<TriggerReply, DispatchError> {
        let ticket = self.tickets.allocate();

        // Teardown releases the table after setting the flag, so a ticket
        // allocated after teardown is caught here.
        if self.is_closed() {
            return Err(DispatchError::WorkerDisconnected);
        }

        tracing::trace!(worker_id = %self.id, correlation_id = %ticket.id(), "Dispatching trigger");

        let message = ServerMessage::trigger_request(ticket.id(), request);
        if let Err(e) = self.outbound.send(message) {
            drop(ticket);
            let error = DispatchError::Dispatch(e.to_string());
            self.close(error.clone());
            return Err(error);
        }

        ticket.wait().await
    }

    /// Read loop. Runs until the stream ends, fails, violates the protocol
    /// or the connection is closed locally.
    ///
    /// Returns `Ok(())` on a clean peer close, otherwise the reason the
    /// connection was torn down. The connection is always closed on return.
    pub async fn listen<S>(&self, inbound: S) -> Result<(), DispatchError>
    where
        S: Stream<Item = Result<WorkerMessage, StreamError>>,
    {
        pin_mut!(inbound);
        let mut closed = self.closed.subscribe();

        let outcome = loop {
            let next = tokio::select! {
                next = inbound.next() => next,
                state = closed.wait_for(Option::is_some) => {
                    break match state {
                        Ok(state) => state.clone().map_or(Ok(()), Err),
                        Err(_) => Ok(()),
                    };
                }
            };

            match next {
                None => {
                    tracing::info!(worker_id = %self.id, "Worker stream ended");
                    break Ok(());
                }
                Some(Err(StreamError::Transport(e))) => {
                    tracing::warn!(worker_id = %self.id, error = %e, "Worker stream failed");
                    break Err(DispatchError::Stream(e));
                }
                Some(Err(StreamError::Decode(e))) => {
                    break Err(DispatchError::ProtocolViolation(format!(
                        "undecodable message: {}",
                        e
                    )));
                }
                Some(Ok(message)) => {
                    if let Err(e) = self.receive(message) {
                        break Err(e);
                    }
                }
            }
        };

        if let Err(DispatchError::ProtocolViolation(detail)) = &outcome {
            metrics::record_protocol_violation();
            tracing::error!(worker_id = %self.id, detail = %detail, "Worker in bad state, closing stream");
        }
        self.close(match &outcome {
            Ok(()) => DispatchError::WorkerDisconnected,
            Err(e) => e.clone(),
        });
        outcome
    }

    fn receive(&self, message: WorkerMessage) -> Result<(), DispatchError> {
        match (message.id, message.content) {
            (_, WorkerContent::InitRequest(_)) => {
                tracing::debug!(worker_id = %self.id, "Received init request from worker");
                if self.outbound.send(ServerMessage::init_response()).is_err() {
                    tracing::debug!(worker_id = %self.id, "Outbound stream gone, init not acknowledged");
                }
                Ok(())
            }
            (Some(id), WorkerContent::TriggerResponse(reply)) => {
                self.tickets
                    .resolve(&id, reply)
                    .map(|_| ())
                    .map_err(|_| {
                        DispatchError::ProtocolViolation(format!(
                            "response tagged with unknown correlation id {}",
                            id
                        ))
                    })
            }
            (None, WorkerContent::TriggerResponse(_)) => Err(DispatchError::ProtocolViolation(
                "trigger response without correlation id".to_string(),
            )),
        }
    }
}
