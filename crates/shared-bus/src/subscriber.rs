//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{BusMessage, TopicFilter};
use futures::stream::{self, BoxStream};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Trait for subscribing to messages from the bus.
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to messages matching a filter.
    fn subscribe(&self, filter: TopicFilter) -> Subscription;
}

/// A subscription handle for receiving messages.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<BusMessage>,

    /// Filter for this subscription.
    filter: TopicFilter,

    /// Reference to subscription tracking (for cleanup).
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Topic key for this subscription.
    topic_key: String,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(
        receiver: broadcast::Receiver<BusMessage>,
        filter: TopicFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        topic_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            topic_key,
        }
    }

    /// Receive the next message that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            let message = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some messages dropped");
                    continue;
                }
            };

            if self.filter.matches(&message) {
                return Some(message);
            }
        }
    }

    /// Try to receive the next message without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available and matched
    /// - `Ok(None)` - No message available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        loop {
            let message = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&message) {
                return Ok(Some(message));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.topic_key) else {
            debug!(topic = %self.topic_key, "Subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.topic_key);
        }
        debug!(topic = %self.topic_key, "Subscription dropped");
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    filter: TopicFilter,
    inner: BoxStream<'static, BusMessage>,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let filter = subscription.filter().clone();
        let inner = stream::unfold(subscription, |mut sub| async move {
            sub.recv().await.map(|message| (message, sub))
        });
        Self {
            filter,
            inner: Box::pin(inner),
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(TopicFilter::all());

        bus.publish(BusMessage::raw("orders", Some(json!({"n": 1}))))
            .await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("message");

        assert_eq!(received.payload, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(TopicFilter::topic("orders.reply"));

        // Different topic: filtered out
        bus.publish(BusMessage::raw("orders", Some(json!(1)))).await;
        bus.publish(BusMessage::raw("orders.reply", Some(json!(2))))
            .await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("message");

        assert_eq!(received.topic, "orders.reply");
        assert_eq!(received.payload, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = InMemoryEventBus::new();

        {
            let _sub1 = bus.subscribe(TopicFilter::all());
            let _sub2 = bus.subscribe(TopicFilter::all());
            assert_eq!(bus.subscriber_count(), 2);
            assert_eq!(bus.subscriptions_for(&TopicFilter::all()), 2);
        }

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.subscriptions_for(&TopicFilter::all()), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(TopicFilter::all());

        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(TopicFilter::all());
        drop(bus);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_event_stream_yields_matching_messages() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(TopicFilter::topic("orders"));
        assert_eq!(EventStream::filter(&stream).topics, vec!["orders".to_string()]);

        bus.publish(BusMessage::raw("tickets", None)).await;
        bus.publish(BusMessage::raw("orders", Some(json!("a")))).await;

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("message");
        assert_eq!(next.payload, Some(json!("a")));
    }
}
