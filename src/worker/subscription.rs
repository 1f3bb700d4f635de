//! Subscription worker: serves event triggers for a topic.
//!
//! Shares the connection and ticket mechanism with route workers; only the
//! request context and the expected reply differ.

use std::sync::Arc;

use crate::error::DispatchError;
use crate::protocol::{ReplyContext, TopicContext, TriggerContext, TriggerRequest};
use crate::triggers::{content_type, EventResponse, EventTrigger, Trigger};
use crate::worker::connection::WorkerConnection;

#[derive(Debug, Clone)]
pub struct SubscriptionWorker {
    /// `None` subscribes to every topic.
    topic: Option<Arc<str>>,
    connection: Arc<WorkerConnection>,
}

impl SubscriptionWorker {
    pub fn new(connection: Arc<WorkerConnection>, topic: Option<String>) -> Self {
        Self {
            topic: topic.map(Arc::from),
            connection,
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn connection(&self) -> &Arc<WorkerConnection> {
        &self.connection
    }

    pub fn matches(&self, trigger: &Trigger) -> bool {
        match trigger {
            Trigger::Event(event) => self.topic().map_or(true, |topic| topic == event.topic()),
            Trigger::Http(_) => false,
        }
    }

    pub async fn handle(&self, trigger: &EventTrigger) -> Result<EventResponse, DispatchError> {
        let request = TriggerRequest {
            data: trigger.payload().to_vec(),
            mime_type: content_type::sniff(trigger.payload()).to_string(),
            context: TriggerContext::Topic(TopicContext {
                id: trigger.id().to_string(),
                topic: trigger.topic().to_string(),
            }),
        };

        let reply = self.connection.call(request).await?;
        match reply.context {
            Some(ReplyContext::Topic(context)) => Ok(EventResponse {
                success: context.success,
            }),
            _ => {
                let error = DispatchError::ProtocolViolation(
                    "incorrect response received from function: expected a topic response"
                        .to_string(),
                );
                self.connection.close(error.clone());
                Err(error)
            }
        }
    }
}
