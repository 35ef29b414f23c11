//! Response listener feeding replies into the pending table.

use crate::domain::PendingRequestStore;
use shared_bus::{BusMessage, Subscription};
use shared_types::Envelope;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Consumes a reply topic and completes matching pending requests.
///
/// Reply topics are shared by every caller of a destination, so replies
/// addressed to another service are skipped.
pub struct ResponseListener {
    pending: Arc<PendingRequestStore>,
    subscription: Subscription,
    service_id: String,
}

impl ResponseListener {
    pub fn new(
        pending: Arc<PendingRequestStore>,
        subscription: Subscription,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            pending,
            subscription,
            service_id: service_id.into(),
        }
    }

    /// Run the listener loop until the bus closes.
    pub async fn run(mut self) {
        info!(
            topics = ?self.subscription.filter().topics,
            service_id = %self.service_id,
            "Response listener started"
        );
        while let Some(message) = self.subscription.recv().await {
            handle_message(&self.pending, &self.service_id, &message);
        }
        warn!("Event bus closed, stopping response listener");
    }
}

/// Route one reply message for `service_id`. Returns true if it resolved a
/// pending request.
///
/// Replies are matched on `correlationId`. Null payloads, non-envelope
/// payloads and replies addressed to another service are ignored; replies
/// that match nothing pending are counted as unmatched.
pub fn handle_message(
    pending: &PendingRequestStore,
    service_id: &str,
    message: &BusMessage,
) -> bool {
    if message.is_null() {
        debug!(topic = %message.topic, "Ignoring null reply");
        return false;
    }
    let envelope = match Envelope::from_payload(message.payload.as_ref()) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(topic = %message.topic, error = %e, "Ignoring undecodable reply");
            return false;
        }
    };

    let Envelope { header, value } = envelope;
    if let Some(destination) = header
        .destination_service
        .as_deref()
        .filter(|d| !d.is_empty() && *d != service_id)
    {
        debug!(
            topic = %message.topic,
            destination = destination,
            "Ignoring reply addressed to another service"
        );
        return false;
    }

    let key = header.correlation_id.as_deref().unwrap_or_default();
    pending.complete(key, value)
}
