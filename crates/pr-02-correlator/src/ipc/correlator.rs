//! Outbound request/response correlation over the bus.

use crate::domain::{CorrelationError, PendingRequestStore};
use shared_bus::{BusMessage, EventPublisher};
use shared_types::{
    ChannelPair, CorrelationId, Envelope, IdGenerator, MessageType, MessageValue, SchemaVersion,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default wait for a reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Removes the pending entry if the `send()` future is dropped mid-wait.
struct PendingGuard<'a> {
    store: &'a PendingRequestStore,
    correlation_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.store.cancel(&self.correlation_id) {
            debug!(correlation_id = %self.correlation_id, "Abandoned pending request removed");
        }
    }
}

/// Publishes request envelopes to one destination service and awaits the
/// reply carrying the same correlation id.
pub struct RequestCorrelator {
    pending: Arc<PendingRequestStore>,
    publisher: Arc<dyn EventPublisher>,
    channel: ChannelPair,
    service_id: String,
    ids: Arc<IdGenerator>,
}

impl RequestCorrelator {
    /// Replies are delivered by a `ResponseListener` sharing `pending` and
    /// subscribed to `channel.response_topic`.
    pub fn new(
        pending: Arc<PendingRequestStore>,
        publisher: Arc<dyn EventPublisher>,
        channel: ChannelPair,
        service_id: impl Into<String>,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            pending,
            publisher,
            channel,
            service_id: service_id.into(),
            ids,
        }
    }

    pub fn channel(&self) -> &ChannelPair {
        &self.channel
    }

    pub fn pending(&self) -> &Arc<PendingRequestStore> {
        &self.pending
    }

    /// Publish `request` and wait for its reply.
    ///
    /// The envelope is stamped with a fresh `RQ-<sourceFunction>-<ts>`
    /// request id, a fresh [`CorrelationId`], the current schema version,
    /// this service as source and the channel's service as destination.
    /// The reply is matched on the correlation id alone, since request ids
    /// from different services can coincide. `timeout` defaults to the
    /// store's default.
    ///
    /// A destination that refuses the envelope as not intended for it
    /// answers with a bare status payload. That payload carries no header to
    /// match, so the call ends in [`CorrelationError::Timeout`].
    #[instrument(skip(self, request), fields(destination = %self.channel.service))]
    pub async fn send(
        &self,
        mut request: Envelope,
        timeout: Option<Duration>,
    ) -> Result<MessageValue, CorrelationError> {
        let timeout = timeout.unwrap_or_else(|| self.pending.default_timeout());
        let source_function = request
            .header
            .source_function
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let request_id = self.ids.request_id(&source_function);
        let correlation_id = CorrelationId::new().to_string();
        self.stamp(&mut request, &request_id, &correlation_id);

        let mut rx = self
            .pending
            .register(&correlation_id, &source_function, Some(timeout));
        let _guard = PendingGuard {
            store: &self.pending,
            correlation_id: correlation_id.clone(),
        };

        let receivers = self
            .publisher
            .publish(BusMessage::envelope(&self.channel.request_topic, &request))
            .await;
        if receivers == 0 {
            self.pending.cancel(&correlation_id);
            return Err(CorrelationError::PublishFailed {
                topic: self.channel.request_topic.clone(),
            });
        }

        debug!(
            request_id = %request_id,
            correlation_id = %correlation_id,
            topic = %self.channel.request_topic,
            "Sent correlated request"
        );

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(CorrelationError::ResponseChannelClosed { request_id }),
            Err(_) => {
                if self.pending.expire(&correlation_id) {
                    return Err(CorrelationError::Timeout {
                        request_id,
                        timeout,
                    });
                }
                // A reply claimed the entry at the deadline; its value is in
                // flight on the oneshot.
                rx.await
                    .map_err(|_| CorrelationError::ResponseChannelClosed { request_id })
            }
        }
    }

    /// [`send`](Self::send), treating every failure as "no answer".
    pub async fn send_or_none(
        &self,
        request: Envelope,
        timeout: Option<Duration>,
    ) -> Option<MessageValue> {
        match self.send(request, timeout).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, destination = %self.channel.service, "No reply to request");
                None
            }
        }
    }

    fn stamp(&self, request: &mut Envelope, request_id: &str, correlation_id: &str) {
        let header = &mut request.header;
        header.request_id = Some(request_id.to_string());
        header.correlation_id = Some(correlation_id.to_string());
        header.response_id = None;
        header.schema_version = Some(SchemaVersion::current().to_string());
        header.source_service = Some(self.service_id.clone());
        header.destination_service = Some(self.channel.service.clone());
        if request.value.message_type.is_none() {
            request.value.message_type = Some(MessageType::Request);
        }
    }
}
