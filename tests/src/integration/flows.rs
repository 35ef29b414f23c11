//! # Integration Test Flows
//!
//! Inbound dispatch driven through the shared bus, and one service calling
//! another through a correlator from inside a handler.
//!
//! ## Flows Tested:
//!
//! 1. **Round trip**: request on `<svc>` → reply on `<svc>.reply`
//! 2. **Routing mismatch**: foreign envelope → status payload, no handler run
//! 3. **Service chain**: handler in service A awaits a function in service B

#[cfg(test)]
mod tests {
    use super::super::request_envelope;
    use pr_01_dispatcher::{FunctionRegistry, InboundContext};
    use router_runtime::{handlers, RouterConfig, RouterRuntime};
    use serde_json::{json, Value};
    use shared_bus::{BusMessage, EventPublisher, InMemoryEventBus, TopicFilter};
    use shared_types::{Envelope, MessageType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn config(service_id: &str) -> RouterConfig {
        RouterConfig {
            service_id: service_id.into(),
            inbound_channel: service_id.into(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    async fn start_router(bus: &Arc<InMemoryEventBus>, registry: FunctionRegistry) -> RouterRuntime {
        let runtime = RouterRuntime::with_bus(config("process-router"), bus.clone()).unwrap();
        runtime.start(registry).await.unwrap();
        runtime
    }

    async fn next_reply(sub: &mut shared_bus::Subscription) -> Value {
        timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("reply timeout")
            .expect("bus open")
            .payload
            .expect("non-null reply")
    }

    // =============================================================================
    // INBOUND DISPATCH OVER THE BUS
    // =============================================================================

    #[tokio::test]
    async fn test_request_reply_round_trip() {
        let bus = Arc::new(InMemoryEventBus::new());
        let runtime = start_router(&bus, handlers::with_builtins().build().unwrap()).await;
        let mut replies = bus.subscribe(TopicFilter::topic("process-router.reply"));

        let mut request = request_envelope("ping", json!({"probe": 1}));
        request.header.destination_service = Some("process-router".into());
        request.header.request_id = Some("RQ-integrationTest-1".into());
        bus.publish(BusMessage::envelope("process-router", &request)).await;

        let reply = Envelope::from_payload(Some(&next_reply(&mut replies).await)).unwrap();
        assert_eq!(reply.value.message_type, Some(MessageType::Response));
        assert_eq!(
            reply.value.message_content,
            Some(json!({"pong": true, "function": "ping", "echo": {"probe": 1}}))
        );
        assert_eq!(reply.value.conversation_id.as_deref(), Some("conv-42"));
        assert_eq!(reply.header.request_id.as_deref(), Some("RQ-integrationTest-1"));
        assert_eq!(reply.header.destination_service.as_deref(), Some("order-forms"));
        assert_eq!(reply.header.source_service.as_deref(), Some("process-router"));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_routing_mismatch_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = FunctionRegistry::builder()
            .register("count", move |_input: Value, _ctx: InboundContext| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(Value::Null)
                }
            })
            .build()
            .unwrap();

        let bus = Arc::new(InMemoryEventBus::new());
        let runtime = start_router(&bus, registry).await;
        let mut replies = bus.subscribe(TopicFilter::topic("process-router.reply"));

        let mut request = request_envelope("count", Value::Null);
        request.header.destination_service = Some("ticketing".into());
        bus.publish(BusMessage::envelope("process-router", &request)).await;

        assert_eq!(
            next_reply(&mut replies).await,
            json!({"messageStatus": "error", "errorMessage": "not intended for this service"})
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_envelope_answered_with_error() {
        let bus = Arc::new(InMemoryEventBus::new());
        let runtime = start_router(&bus, handlers::with_builtins().build().unwrap()).await;
        let mut replies = bus.subscribe(TopicFilter::topic("process-router.reply"));

        let mut request = request_envelope("ping", Value::Null);
        request.header.instance_name = None;
        bus.publish(BusMessage::envelope("process-router", &request)).await;

        let reply = Envelope::from_payload(Some(&next_reply(&mut replies).await)).unwrap();
        assert_eq!(reply.value.message_type, Some(MessageType::ErrorResponse));
        assert_eq!(reply.value.error, Some(true));
        assert_eq!(reply.value.error_code.as_deref(), Some("MISSING_HEADER_FIELD"));
        assert!(reply
            .header
            .request_id
            .as_deref()
            .unwrap()
            .starts_with("Not-Sent-"));

        runtime.shutdown().await;
    }

    // =============================================================================
    // SERVICE TO SERVICE
    // =============================================================================

    #[tokio::test]
    async fn test_handler_calls_other_service() {
        let bus = Arc::new(InMemoryEventBus::new());

        // Service B: ticketing
        let ticketing = RouterRuntime::with_bus(config("ticketing"), bus.clone()).unwrap();
        let ticketing_registry = FunctionRegistry::builder()
            .register("createIssue", |input: Value, _ctx: InboundContext| async move {
                let summary = input["summary"].as_str().unwrap_or_default().to_string();
                Ok::<_, anyhow::Error>(json!({"key": "OPS-7", "summary": summary}))
            })
            .build()
            .unwrap();
        ticketing.start(ticketing_registry).await.unwrap();

        // Service A: process-router, whose handler calls ticketing
        let router = RouterRuntime::with_bus(config("process-router"), bus.clone()).unwrap();
        let to_ticketing = Arc::new(router.correlator("ticketing"));
        let router_registry = FunctionRegistry::builder()
            .register("openTicket", move |input: Value, ctx: InboundContext| {
                let to_ticketing = to_ticketing.clone();
                async move {
                    let mut call = request_envelope("createIssue", input);
                    call.header.source_function = Some(ctx.function_name.clone());
                    let reply = to_ticketing
                        .send_or_none(call, None)
                        .await
                        .ok_or_else(|| anyhow::anyhow!("ticketing did not answer"))?;
                    Ok::<_, anyhow::Error>(reply.message_content.unwrap_or(Value::Null))
                }
            })
            .build()
            .unwrap();
        router.start(router_registry).await.unwrap();

        let caller = router.correlator("process-router");
        let reply = caller
            .send(
                request_envelope("openTicket", json!({"summary": "Printer on fire"})),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            reply.message_content,
            Some(json!({"key": "OPS-7", "summary": "Printer on fire"}))
        );
        assert_eq!(router.pending_stats().completed, 2);

        router.shutdown().await;
        ticketing.shutdown().await;
    }
}
