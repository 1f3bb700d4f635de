//! Worker registry and selection.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::Stream;

use crate::error::DispatchError;
use crate::observability::metrics;
use crate::protocol::WorkerMessage;
use crate::triggers::Trigger;
use crate::worker::{StreamError, Worker, WorkerStatus};

/// Registry of live workers.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: RwLock<Vec<Worker>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker behind all existing ones.
    pub fn add(&self, worker: Worker) {
        let mut workers = self.write();
        tracing::info!(worker_id = %worker.id(), "Worker registered");
        workers.push(worker);
        metrics::set_workers_connected(workers.len());
    }

    /// Unregister a worker. Returns false if it was not registered.
    pub fn remove(&self, worker: &Worker) -> bool {
        let mut workers = self.write();
        let id = worker.id();
        let Some(index) = workers.iter().position(|w| w.id() == id) else {
            return false;
        };
        // Order-preserving so selection stays deterministic
        workers.remove(index);
        metrics::set_workers_connected(workers.len());
        tracing::info!(worker_id = %id, remaining = workers.len(), "Worker removed");
        true
    }

    /// First registered worker whose `matches` holds for `trigger`.
    pub fn select(&self, trigger: &Trigger) -> Result<Worker, DispatchError> {
        let workers = self.read();
        match workers.iter().find(|w| w.matches(trigger)) {
            Some(worker) => Ok(worker.clone()),
            None => {
                tracing::debug!(
                    kind = trigger.kind().as_str(),
                    registered = workers.len(),
                    "No worker matched trigger"
                );
                Err(DispatchError::NoWorkerAvailable)
            }
        }
    }

    /// Register `worker`, serve its stream until it ends, then unregister
    /// it. Returns the reason the stream ended.
    pub async fn attach<S>(&self, worker: Worker, inbound: S) -> Result<(), DispatchError>
    where
        S: Stream<Item = Result<WorkerMessage, StreamError>>,
    {
        self.add(worker.clone());
        let outcome = worker.connection().listen(inbound).await;
        self.remove(&worker);

        match &outcome {
            Ok(()) => tracing::info!(worker_id = %worker.id(), "Worker disconnected"),
            Err(e) => tracing::warn!(worker_id = %worker.id(), error = %e, "Worker torn down"),
        }
        outcome
    }

    /// Close every registered worker, releasing their pending callers.
    ///
    /// Each worker's `attach` then unregisters it as its listen loop ends.
    /// Returns how many workers were closed.
    pub fn close_all(&self, reason: DispatchError) -> usize {
        let workers: Vec<Worker> = self.read().clone();
        for worker in &workers {
            worker.connection().close(reason.clone());
        }
        workers.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Status of every registered worker, in selection order.
    pub fn snapshot(&self) -> Vec<WorkerStatus> {
        self.read().iter().map(Worker::status).collect()
    }

    // A panic while holding the lock cannot leave the Vec half-modified,
    // so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Worker>> {
        self.workers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Worker>> {
        self.workers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TriggerReply;
    use crate::triggers::{EventTrigger, HttpTrigger, MultiMap, Response};
    use crate::worker::connection::testing::connect;
    use crate::worker::{Registration, RouteDescriptor};
    use std::sync::Arc;

    fn route(methods: &[&str], path: &str) -> Registration {
        Registration::Route(RouteDescriptor::new(methods.iter().copied(), path).unwrap())
    }

    #[tokio::test]
    async fn test_select_first_match_in_registration_order() {
        let pool = WorkerPool::new();
        let (c1, _p1, _i1) = connect();
        let (c2, _p2, _i2) = connect();
        let (c3, _p3, _i3) = connect();

        let specific = route(&["GET"], "/items/:id").into_worker(c1);
        let catch_all = route(&[], "/items/:id").into_worker(c2);
        let events = Registration::Subscription { topic: None }.into_worker(c3);
        pool.add(specific.clone());
        pool.add(catch_all.clone());
        pool.add(events.clone());

        let get = pool.select(&HttpTrigger::new("GET", "/items/1").into()).unwrap();
        assert_eq!(get.id(), specific.id());

        let post = pool.select(&HttpTrigger::new("POST", "/items/1").into()).unwrap();
        assert_eq!(post.id(), catch_all.id());

        let event = pool
            .select(&EventTrigger::new("1", "orders", &b""[..]).into())
            .unwrap();
        assert_eq!(event.id(), events.id());
    }

    #[tokio::test]
    async fn test_no_match_is_no_worker_available() {
        let pool = WorkerPool::new();
        assert!(pool.is_empty());
        assert_eq!(
            pool.select(&HttpTrigger::new("GET", "/").into()).unwrap_err(),
            DispatchError::NoWorkerAvailable
        );

        let (conn, _peer, _inbound) = connect();
        pool.add(route(&["GET"], "/users/:id").into_worker(conn));
        assert_eq!(
            pool.select(&HttpTrigger::new("GET", "/users").into()).unwrap_err(),
            DispatchError::NoWorkerAvailable
        );
    }

    #[tokio::test]
    async fn test_remove_preserves_order() {
        let pool = WorkerPool::new();
        let workers: Vec<Worker> = (0..3)
            .map(|_| {
                let (conn, _peer, _inbound) = connect();
                route(&[], "/").into_worker(conn)
            })
            .collect();
        for worker in &workers {
            pool.add(worker.clone());
        }

        assert!(pool.remove(&workers[0]));
        assert!(!pool.remove(&workers[0]));
        assert_eq!(pool.len(), 2);

        let selected = pool.select(&HttpTrigger::new("GET", "/").into()).unwrap();
        assert_eq!(selected.id(), workers[1].id());
    }

    #[tokio::test]
    async fn test_terminated_stream_removes_worker() {
        let pool = Arc::new(WorkerPool::new());
        let (conn, peer, inbound) = connect();
        let worker = route(&["GET"], "/").into_worker(conn);

        let attached = tokio::spawn({
            let pool = pool.clone();
            let worker = worker.clone();
            async move { pool.attach(worker, inbound).await }
        });
        tokio::task::yield_now().await;

        drop(peer);
        assert_eq!(attached.await.unwrap(), Ok(()));
        assert!(pool.is_empty());
        assert!(!worker.matches(&HttpTrigger::new("GET", "/").into()));
        assert_eq!(
            pool.select(&HttpTrigger::new("GET", "/").into()).unwrap_err(),
            DispatchError::NoWorkerAvailable
        );
    }

    #[tokio::test]
    async fn test_protocol_violation_removes_worker_and_fails_pending() {
        let pool = Arc::new(WorkerPool::new());
        let (conn, mut peer, inbound) = connect();
        let worker = route(&["GET"], "/items/:id").into_worker(conn);

        let attached = tokio::spawn({
            let pool = pool.clone();
            let worker = worker.clone();
            async move { pool.attach(worker, inbound).await }
        });

        let trigger: Trigger = HttpTrigger::new("GET", "/items/7").into();
        let in_flight = {
            // Wait until the worker is registered
            let selected = loop {
                if let Ok(worker) = pool.select(&trigger) {
                    break worker;
                }
                tokio::task::yield_now().await;
            };
            let trigger = trigger.clone();
            tokio::spawn(async move { selected.handle(&trigger).await })
        };

        let _ = peer.next_request().await;
        peer.reply("bogus", TriggerReply::http(200, MultiMap::new(), Vec::new()));

        assert!(matches!(
            attached.await.unwrap(),
            Err(DispatchError::ProtocolViolation(_))
        ));
        assert_eq!(in_flight.await.unwrap(), Err::<Response, _>(DispatchError::WorkerDisconnected));
        assert!(pool.is_empty());
        assert!(pool.select(&trigger).is_err());
        drop(worker);
    }

    #[tokio::test]
    async fn test_close_all_releases_callers_and_unregisters() {
        let pool = Arc::new(WorkerPool::new());
        let (conn, mut peer, inbound) = connect();
        let worker = route(&[], "/").into_worker(conn.clone());

        let attached = tokio::spawn({
            let pool = pool.clone();
            async move { pool.attach(worker, inbound).await }
        });
        let trigger: Trigger = HttpTrigger::new("GET", "/").into();
        let selected = loop {
            if let Ok(worker) = pool.select(&trigger) {
                break worker;
            }
            tokio::task::yield_now().await;
        };
        let in_flight = tokio::spawn({
            let trigger = trigger.clone();
            async move { selected.handle(&trigger).await }
        });
        let _ = peer.next_request().await;

        assert_eq!(pool.close_all(DispatchError::WorkerDisconnected), 1);
        assert_eq!(
            in_flight.await.unwrap(),
            Err::<Response, _>(DispatchError::WorkerDisconnected)
        );
        assert_eq!(
            attached.await.unwrap(),
            Err(DispatchError::WorkerDisconnected)
        );
        assert!(pool.is_empty());
        assert_eq!(conn.pending(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_registration_and_selection() {
        let pool = Arc::new(WorkerPool::new());
        let mut tasks = Vec::new();
        let mut peers = Vec::new();

        for i in 0..16 {
            let (conn, peer, _inbound) = connect();
            peers.push(peer);
            let worker = route(&[], &format!("/w/{}", i)).into_worker(conn);
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                pool.add(worker.clone());
                let found = pool
                    .select(&HttpTrigger::new("GET", format!("/w/{}", i)).into())
                    .unwrap();
                assert_eq!(found.id(), worker.id());
                assert!(pool.remove(&worker));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(pool.is_empty());
    }
}
