//! # Correlation Flows
//!
//! Outbound `send()` against simulated responders on the bus.
//!
//! ## Flows Tested:
//!
//! 1. **Concurrent sends**: replies delivered out of order still reach the
//!    caller whose request they answer
//! 2. **Late reply**: a reply arriving after the caller timed out is dropped
//! 3. **Duplicate reply**: only the first reply for a request resolves it
//! 4. **Two callers, one destination**: services whose request ids coincide
//!    still each get their own reply

#[cfg(test)]
mod tests {
    use super::super::request_envelope;
    use pr_02_correlator::{
        CorrelationError, PendingRequestStore, RequestCorrelator, ResponseListener,
    };
    use serde_json::{json, Value};
    use shared_bus::{BusMessage, EventPublisher, InMemoryEventBus, Subscription, TopicFilter};
    use shared_types::{
        ChannelPair, Envelope, IdGenerator, MessageHeader, MessageType, MessageValue, TimeSource,
    };
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Harness {
        bus: Arc<InMemoryEventBus>,
        pending: Arc<PendingRequestStore>,
        correlator: Arc<RequestCorrelator>,
        /// Requests as seen by the simulated responder.
        requests: Subscription,
    }

    struct FrozenClock(u64);

    impl TimeSource for FrozenClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    /// A service calling "spreadsheets", with its own pending table and
    /// reply listener.
    fn caller(
        bus: &Arc<InMemoryEventBus>,
        service_id: &str,
        ids: IdGenerator,
    ) -> (Arc<PendingRequestStore>, Arc<RequestCorrelator>) {
        let channel = ChannelPair::for_service("spreadsheets");
        let pending = Arc::new(PendingRequestStore::new(Duration::from_secs(2)));

        let listener = ResponseListener::new(
            pending.clone(),
            bus.subscribe(TopicFilter::topic(&channel.response_topic)),
            service_id,
        );
        tokio::spawn(listener.run());

        let correlator = Arc::new(RequestCorrelator::new(
            pending.clone(),
            bus.clone(),
            channel,
            service_id,
            Arc::new(ids),
        ));
        (pending, correlator)
    }

    fn harness() -> Harness {
        let bus = Arc::new(InMemoryEventBus::new());
        let requests = bus.subscribe(TopicFilter::topic("spreadsheets"));
        let (pending, correlator) = caller(&bus, "process-router", IdGenerator::system());

        Harness {
            bus,
            pending,
            correlator,
            requests,
        }
    }

    async fn next_request(requests: &mut Subscription) -> Envelope {
        let message = tokio::time::timeout(Duration::from_secs(2), requests.recv())
            .await
            .expect("request timeout")
            .expect("bus open");
        Envelope::from_payload(message.payload.as_ref()).expect("request envelope")
    }

    /// Reply the simulated responder publishes for `request`.
    async fn answer(bus: &InMemoryEventBus, request: &Envelope, content: Value) {
        let reply = Envelope::new(
            MessageHeader {
                source_service: Some("spreadsheets".into()),
                destination_service: request.header.source_service.clone(),
                request_id: request.header.request_id.clone(),
                correlation_id: request.header.correlation_id.clone(),
                ..Default::default()
            },
            MessageValue {
                message_content: Some(content),
                message_type: Some(MessageType::Response),
                ..Default::default()
            },
        );
        bus.publish(BusMessage::envelope("spreadsheets.reply", &reply))
            .await;
    }

    fn input_of(request: &Envelope) -> Value {
        request.value.message_content.as_ref().unwrap()["functionInput"].clone()
    }

    // =============================================================================
    // CORRELATION TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_concurrent_sends_get_their_own_replies() {
        let Harness {
            bus,
            pending,
            correlator,
            mut requests,
        } = harness();

        let first = tokio::spawn({
            let correlator = correlator.clone();
            async move {
                correlator
                    .send(request_envelope("render", json!("sheet-a")), None)
                    .await
            }
        });
        let req_a = next_request(&mut requests).await;

        let second = tokio::spawn({
            let correlator = correlator.clone();
            async move {
                correlator
                    .send(request_envelope("render", json!("sheet-b")), None)
                    .await
            }
        });
        let req_b = next_request(&mut requests).await;
        assert_ne!(req_a.header.request_id, req_b.header.request_id);

        // Answer in reverse order, plus a tombstone in between.
        answer(&bus, &req_b, json!({"rendered": input_of(&req_b)})).await;
        bus.publish(BusMessage::raw("spreadsheets.reply", None)).await;
        answer(&bus, &req_a, json!({"rendered": input_of(&req_a)})).await;

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert_eq!(a.message_content, Some(json!({"rendered": "sheet-a"})));
        assert_eq!(b.message_content, Some(json!({"rendered": "sheet-b"})));
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_late_reply_after_timeout_is_dropped() {
        let Harness {
            bus,
            pending,
            correlator,
            mut requests,
        } = harness();

        let err = correlator
            .send(
                request_envelope("render", json!("slow")),
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::Timeout { .. }));

        let request = next_request(&mut requests).await;
        answer(&bus, &request, json!({"rendered": "too late"})).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = pending.stats().snapshot();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_reply_resolves_once() {
        let Harness {
            bus,
            pending,
            correlator,
            mut requests,
        } = harness();

        let call = tokio::spawn({
            let correlator = correlator.clone();
            async move {
                correlator
                    .send(request_envelope("render", json!("dup")), None)
                    .await
            }
        });
        let request = next_request(&mut requests).await;
        answer(&bus, &request, json!(1)).await;
        answer(&bus, &request, json!(2)).await;

        let value = call.await.unwrap().unwrap();
        assert_eq!(value.message_content, Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = pending.stats().snapshot();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.unmatched, 1);
    }

    #[tokio::test]
    async fn test_callers_with_colliding_request_ids_stay_separate() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut requests = bus.subscribe(TopicFilter::topic("spreadsheets"));
        let frozen = || IdGenerator::new(Arc::new(FrozenClock(1_700_000_000_000)));
        let (pending_a, svc_a) = caller(&bus, "svc-a", frozen());
        let (pending_b, svc_b) = caller(&bus, "svc-b", frozen());

        let call_a = tokio::spawn({
            let svc_a = svc_a.clone();
            async move { svc_a.send(request_envelope("render", json!("A")), None).await }
        });
        let req_a = next_request(&mut requests).await;
        let call_b = tokio::spawn({
            let svc_b = svc_b.clone();
            async move { svc_b.send(request_envelope("render", json!("B")), None).await }
        });
        let req_b = next_request(&mut requests).await;

        assert_eq!(req_a.header.request_id, req_b.header.request_id);
        assert_ne!(req_a.header.correlation_id, req_b.header.correlation_id);

        answer(&bus, &req_b, json!({"for": input_of(&req_b)})).await;
        answer(&bus, &req_a, json!({"for": input_of(&req_a)})).await;

        let a = call_a.await.unwrap().unwrap();
        let b = call_b.await.unwrap().unwrap();
        assert_eq!(a.message_content, Some(json!({"for": "A"})));
        assert_eq!(b.message_content, Some(json!({"for": "B"})));

        tokio::time::sleep(Duration::from_millis(20)).await;
        for pending in [pending_a, pending_b] {
            let stats = pending.stats().snapshot();
            assert_eq!(stats.completed, 1);
            assert_eq!(stats.unmatched, 0);
        }
    }
}
