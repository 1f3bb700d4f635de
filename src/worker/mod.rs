//! Worker subsystem.
//!
//! # Data Flow
//! ```text
//! Worker::handle(trigger)
//!     → route.rs / subscription.rs (build the trigger request)
//!     → connection.rs (allocate ticket, send, await)
//!     → ticket.rs (single-use reply slot keyed by correlation id)
//!
//! WorkerConnection::listen(inbound)   [one task per connected worker]
//!     → resolve tickets as replies arrive, in any order
//!     → tear down on stream end or protocol violation
//! ```
//!
//! # Design Decisions
//! - Worker kinds are variants of one enum, dispatched by `match`
//! - Workers are cheap `Arc`-backed handles; cloning never duplicates a
//!   connection
//! - A closed worker never matches anything, even before the pool has
//!   removed it

use std::sync::Arc;

use serde::Serialize;

use crate::error::DispatchError;
use crate::triggers::{Response, Trigger};

pub mod connection;
pub mod route;
pub mod route_matcher;
pub mod subscription;
pub mod ticket;

pub use connection::{Outbound, StreamError, WorkerConnection, WorkerId};
pub use route::RouteWorker;
pub use route_matcher::{DescriptorError, PathTemplate, RouteDescriptor, Segment};
pub use subscription::SubscriptionWorker;
pub use ticket::{Resolution, Ticket, TicketTable};

/// A connected function worker.
#[derive(Debug, Clone)]
pub enum Worker {
    Route(RouteWorker),
    Subscription(SubscriptionWorker),
}

impl Worker {
    pub fn id(&self) -> WorkerId {
        self.connection().id()
    }

    pub fn connection(&self) -> &Arc<WorkerConnection> {
        match self {
            Worker::Route(worker) => worker.connection(),
            Worker::Subscription(worker) => worker.connection(),
        }
    }

    /// Can this worker serve `trigger`?
    pub fn matches(&self, trigger: &Trigger) -> bool {
        if self.connection().is_closed() {
            return false;
        }
        match self {
            Worker::Route(worker) => worker.matches(trigger),
            Worker::Subscription(worker) => worker.matches(trigger),
        }
    }

    /// Forward `trigger` to the worker and wait for its response.
    pub async fn handle(&self, trigger: &Trigger) -> Result<Response, DispatchError> {
        match (self, trigger) {
            (Worker::Route(worker), Trigger::Http(http)) => {
                worker.handle(http).await.map(Response::Http)
            }
            (Worker::Subscription(worker), Trigger::Event(event)) => {
                worker.handle(event).await.map(Response::Event)
            }
            (Worker::Route(_), Trigger::Event(_)) => Err(DispatchError::Unsupported(
                "route workers cannot handle events",
            )),
            (Worker::Subscription(_), Trigger::Http(_)) => Err(DispatchError::Unsupported(
                "subscription workers cannot handle http requests",
            )),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        let (kind, route, topic) = match self {
            Worker::Route(worker) => ("route", Some(worker.descriptor().to_string()), None),
            Worker::Subscription(worker) => {
                ("subscription", None, worker.topic().map(str::to_string))
            }
        };
        WorkerStatus {
            id: self.id().to_string(),
            kind,
            route,
            topic,
            pending: self.connection().pending(),
            closed: self.connection().is_closed(),
        }
    }
}

impl From<RouteWorker> for Worker {
    fn from(worker: RouteWorker) -> Self {
        Worker::Route(worker)
    }
}

impl From<SubscriptionWorker> for Worker {
    fn from(worker: SubscriptionWorker) -> Self {
        Worker::Subscription(worker)
    }
}

/// Static metadata a worker supplies when it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Route(RouteDescriptor),
    Subscription { topic: Option<String> },
}

impl Registration {
    pub fn into_worker(self, connection: Arc<WorkerConnection>) -> Worker {
        match self {
            Registration::Route(descriptor) => RouteWorker::new(connection, descriptor).into(),
            Registration::Subscription { topic } => {
                SubscriptionWorker::new(connection, topic).into()
            }
        }
    }
}

/// Point-in-time view of a worker, for status listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub id: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub pending: usize,
    pub closed: bool,
}
