//! Bus consumer loop for the inbound request channel.

use crate::dispatcher::{DispatchOutcome, InboundDispatcher};
use shared_bus::{BusMessage, EventPublisher, Subscription};
use shared_types::ChannelPair;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pulls inbound messages off the request topic and publishes exactly one
/// reply per message on the reply topic.
///
/// Messages are handled one at a time in arrival order.
pub struct InboundConsumer {
    dispatcher: Arc<InboundDispatcher>,
    publisher: Arc<dyn EventPublisher>,
    subscription: Subscription,
    reply_topic: String,
}

impl InboundConsumer {
    /// `subscription` must already be filtered to `channel.request_topic`.
    pub fn new(
        dispatcher: Arc<InboundDispatcher>,
        publisher: Arc<dyn EventPublisher>,
        subscription: Subscription,
        channel: &ChannelPair,
    ) -> Self {
        Self {
            dispatcher,
            publisher,
            subscription,
            reply_topic: channel.response_topic.clone(),
        }
    }

    /// Handle a single bus message and publish its reply.
    pub async fn process(&self, message: &BusMessage) -> DispatchOutcome {
        let outcome = self.dispatcher.handle_payload(message.payload.as_ref()).await;
        let receivers = self
            .publisher
            .publish(BusMessage::raw(&self.reply_topic, Some(outcome.to_payload())))
            .await;
        if receivers == 0 {
            warn!(topic = %self.reply_topic, "Reply published with no listeners");
        }
        debug!(state = %outcome.state(), topic = %self.reply_topic, "Reply published");
        outcome
    }

    /// Run until the bus closes.
    pub async fn run(mut self) {
        info!(
            service_id = self.dispatcher.service_id(),
            reply_topic = %self.reply_topic,
            "Inbound consumer started"
        );
        while let Some(message) = self.subscription.recv().await {
            self.process(&message).await;
        }
        warn!("Event bus closed, stopping inbound consumer");
    }
}
