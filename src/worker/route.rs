//! Route worker: serves HTTP triggers matching a method/path descriptor.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::DispatchError;
use crate::protocol::{HttpContext, ReplyContext, TriggerContext, TriggerReply, TriggerRequest};
use crate::triggers::{HttpResponse, HttpTrigger, MultiMap, Trigger};
use crate::worker::connection::WorkerConnection;
use crate::worker::route_matcher::RouteDescriptor;

/// Headers whose values are all kept when a reply is translated. Every
/// other header keeps only its first value.
const MULTI_VALUE_HEADERS: &[&str] = &["set-cookie", "cookie"];

#[derive(Debug, Clone)]
pub struct RouteWorker {
    descriptor: Arc<RouteDescriptor>,
    connection: Arc<WorkerConnection>,
}

impl RouteWorker {
    pub fn new(connection: Arc<WorkerConnection>, descriptor: RouteDescriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            connection,
        }
    }

    pub fn descriptor(&self) -> &RouteDescriptor {
        &self.descriptor
    }

    pub fn connection(&self) -> &Arc<WorkerConnection> {
        &self.connection
    }

    /// Route workers only ever serve HTTP triggers.
    pub fn matches(&self, trigger: &Trigger) -> bool {
        match trigger {
            Trigger::Http(http) => self.descriptor.matches(http),
            Trigger::Event(_) => false,
        }
    }

    pub async fn handle(&self, trigger: &HttpTrigger) -> Result<HttpResponse, DispatchError> {
        let request = TriggerRequest {
            data: trigger.body().to_vec(),
            mime_type: trigger.content_type(),
            context: TriggerContext::Http(HttpContext {
                method: trigger.method().to_string(),
                path: trigger.path().to_string(),
                headers: trigger.headers().clone(),
                query_params: trigger.query().clone(),
            }),
        };

        let reply = self.connection.call(request).await?;
        into_http_response(reply).inspect_err(|e| self.connection.close(e.clone()))
    }
}

fn into_http_response(reply: TriggerReply) -> Result<HttpResponse, DispatchError> {
    match reply.context {
        Some(ReplyContext::Http(context)) => Ok(HttpResponse {
            status: context.status,
            headers: collapse_headers(context.headers),
            body: Bytes::from(reply.data),
        }),
        _ => Err(DispatchError::ProtocolViolation(
            "incorrect response received from function: expected an http response".to_string(),
        )),
    }
}

fn collapse_headers(headers: MultiMap) -> MultiMap {
    headers
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(name, mut values)| {
            if !MULTI_VALUE_HEADERS
                .iter()
                .any(|multi| name.eq_ignore_ascii_case(multi))
            {
                values.truncate(1);
            }
            (name, values)
        })
        .collect()
}
