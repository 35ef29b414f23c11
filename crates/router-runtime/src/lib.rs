//! # Process-Router Runtime
//!
//! Wires the envelope protocol together for one service process.
//!
//! ```text
//!            ┌───────────────────────── InMemoryEventBus ─────────────────────────┐
//!            │                                                                    │
//!  "<inbound>" ──→ InboundConsumer ──→ InboundDispatcher ──→ FunctionRegistry     │
//!            │            │                                        │ handler      │
//!            │            └──reply──→ "<inbound>.reply"            ▼              │
//!            │                                          RequestCorrelator.send()  │
//!            │                                                     │              │
//!            │      "<dest>.reply" ──→ ResponseListener ──→ PendingRequestStore   │
//!            └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load and validate [`RouterConfig`]
//! 2. Initialize logging
//! 3. Create the bus, id generator and pending-request store
//! 4. Build correlators for any services handlers call out to
//! 5. Register functions and [`RouterRuntime::start`]
//! 6. Wait for ctrl-c and [`RouterRuntime::shutdown`]

pub mod config;
pub mod handlers;
pub mod logging;

pub use config::{ConfigError, RouterConfig};
pub use logging::{init_logging, LoggingError};

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use pr_01_dispatcher::{FunctionRegistry, InboundConsumer, InboundDispatcher};
use pr_02_correlator::{
    cleanup_task, PendingRequestStore, PendingStatsSnapshot, RequestCorrelator, ResponseListener,
};
use shared_bus::{InMemoryEventBus, TopicFilter};
use shared_types::{ChannelPair, IdGenerator};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// The router runtime for one service process.
pub struct RouterRuntime {
    config: RouterConfig,
    bus: Arc<InMemoryEventBus>,
    ids: Arc<IdGenerator>,
    pending: Arc<PendingRequestStore>,
    /// Reply topics that already have a listener.
    reply_topics: Mutex<HashSet<String>>,
    /// Listeners created before `start()`.
    queued_listeners: Mutex<Vec<ResponseListener>>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RouterRuntime {
    /// Create a runtime with its own bus.
    pub fn new(config: RouterConfig) -> Result<Self> {
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus_capacity));
        Self::with_bus(config, bus)
    }

    /// Create a runtime attached to an existing bus.
    pub fn with_bus(config: RouterConfig, bus: Arc<InMemoryEventBus>) -> Result<Self> {
        config.validate().context("invalid router configuration")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            pending: Arc::new(PendingRequestStore::new(config.request_timeout)),
            ids: Arc::new(IdGenerator::system()),
            config,
            bus,
            reply_topics: Mutex::new(HashSet::new()),
            queued_listeners: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    /// The inbound channel pair this runtime consumes and replies on.
    pub fn inbound_channel(&self) -> ChannelPair {
        ChannelPair::for_service(&self.config.inbound_channel)
    }

    pub fn pending_stats(&self) -> PendingStatsSnapshot {
        self.pending.stats().snapshot()
    }

    /// Correlator for calls to `destination`.
    ///
    /// The reply subscription is taken immediately so no reply published
    /// after this call is missed. Its listener task runs once the runtime
    /// has started.
    pub fn correlator(&self, destination: &str) -> RequestCorrelator {
        let channel = ChannelPair::for_service(destination);

        let is_new = self
            .reply_topics
            .lock()
            .insert(channel.response_topic.clone());
        if is_new {
            let listener = ResponseListener::new(
                Arc::clone(&self.pending),
                self.bus
                    .subscribe(TopicFilter::topic(&channel.response_topic)),
                self.config.service_id.clone(),
            );
            if self.started.load(Ordering::Acquire) {
                self.spawn_until_shutdown("response-listener", listener.run());
            } else {
                self.queued_listeners.lock().push(listener);
            }
        }

        RequestCorrelator::new(
            Arc::clone(&self.pending),
            self.bus.clone(),
            channel,
            self.config.service_id.clone(),
            Arc::clone(&self.ids),
        )
    }

    /// Start consuming the inbound channel with `registry`.
    pub async fn start(&self, registry: FunctionRegistry) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            bail!("router runtime already started");
        }

        info!("===========================================");
        info!("  Process Router v{}", env!("CARGO_PKG_VERSION"));
        info!("  Service: {}", self.config.service_id);
        info!("===========================================");

        let channel = self.inbound_channel();
        let functions = registry.names().join(", ");
        let dispatcher = Arc::new(InboundDispatcher::new(
            self.config.service_id.clone(),
            Arc::new(registry),
            Arc::clone(&self.ids),
        ));
        let consumer = InboundConsumer::new(
            dispatcher,
            self.bus.clone(),
            self.bus.subscribe(TopicFilter::topic(&channel.request_topic)),
            &channel,
        );
        self.spawn_until_shutdown("inbound-consumer", consumer.run());

        let queued: Vec<ResponseListener> = std::mem::take(&mut *self.queued_listeners.lock());
        for listener in queued {
            self.spawn_until_shutdown("response-listener", listener.run());
        }

        let sweep_interval = self.config.request_timeout.max(Duration::from_secs(1));
        self.spawn_until_shutdown(
            "pending-cleanup",
            cleanup_task(Arc::clone(&self.pending), sweep_interval),
        );

        info!(
            inbound = %channel.request_topic,
            replies = %channel.response_topic,
            functions = %functions,
            "Router started"
        );
        Ok(())
    }

    /// Signal every task to stop.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        tokio::task::yield_now().await;
        info!(
            pending = self.pending.pending_count(),
            "Shutdown complete"
        );
    }

    fn spawn_until_shutdown<F>(&self, task: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = fut => {}
                _ = shutdown.changed() => {
                    info!(task = task, "Shutdown signal received");
                }
            }
        });
    }
}
