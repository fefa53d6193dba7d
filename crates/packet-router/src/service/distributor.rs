//! # Distributor
//!
//! The routing loop. One task, sole writer of packet numbers and statistics.
//!
//! ```text
//! ingress queues ──▶ pop ──▶ enrich ──▶ route_targets ──▶ consumer queues
//!  (StreamMap)                   │                              │
//!                                └────────▶ statistics ◀────────┘
//! ```
//!
//! The loop waits on shutdown, control commands and every producer queue at
//! once, so shutdown and registration are serviced between packets. A packet
//! in flight is always enriched, routed and recorded completely.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use shared_bus::{PacketRef, ProducerHandle};
use shared_types::{DeviceId, HostIdentity};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, info, trace, warn};

use crate::config::RouterConfig;
use crate::domain::{extract_key_paths, PacketEnricher, StatisticsTracker, SubscriptionRegistry};
use crate::error::RouterError;
use crate::metrics::{Metrics, MetricsRecorder, NoOpMetrics};
use crate::service::RouterHandle;

/// State shared between the loop and every [`RouterHandle`].
pub(crate) struct RouterState {
    pub(crate) host: Arc<HostIdentity>,
    pub(crate) config: RouterConfig,
    pub(crate) registry: RwLock<SubscriptionRegistry>,
    pub(crate) statistics: StatisticsTracker,
    /// consumer -> sending half of its inbound queue
    pub(crate) outboxes: RwLock<HashMap<DeviceId, mpsc::Sender<PacketRef>>>,
    /// producer -> submitting half of its ingress queue
    pub(crate) producers: RwLock<HashMap<DeviceId, ProducerHandle>>,
    pub(crate) metrics: Metrics,
    pub(crate) recorder: Arc<dyn MetricsRecorder>,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl RouterState {
    /// Forget a consumer whose queue is gone, but only while `closed` is
    /// still its registered queue. A consumer re-registered under the same
    /// id keeps its new queue.
    pub(crate) fn retire_consumer_if(&self, id: &str, closed: &mpsc::Sender<PacketRef>) -> bool {
        let mut outboxes = self.outboxes.write();
        if !outboxes.get(id).is_some_and(|current| current.same_channel(closed)) {
            debug!(consumer = id, "Closed queue already replaced, nothing to retire");
            return false;
        }
        outboxes.remove(id);
        let removed = self.registry.write().retire_consumer(id);
        info!(consumer = id, subscriptions = removed, "Consumer queue closed, consumer retired");
        true
    }

    fn on_metrics(&self, record: impl Fn(&dyn MetricsRecorder)) {
        record(&self.metrics);
        record(self.recorder.as_ref());
    }
}

/// Control messages from handles to the loop.
pub(crate) enum Command {
    AttachProducer {
        device: DeviceId,
        device_module: String,
        receiver: mpsc::Receiver<Value>,
    },
    DetachProducer {
        device: DeviceId,
    },
}

enum Event {
    Stop,
    Command(Command),
    Payload(DeviceId, Value),
}

/// Outcome of pushing one packet to one consumer.
enum Delivery {
    Delivered,
    /// Queue stayed full for the whole delivery timeout.
    Dropped,
    /// Consumer dropped its handle. Carries the queue that was used.
    Closed(mpsc::Sender<PacketRef>),
    /// No queue registered (yet).
    Missing,
}

/// The routing loop. Owns the enricher and the ingress side of every
/// producer queue.
pub struct Distributor {
    state: Arc<RouterState>,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: watch::Receiver<bool>,
    enricher: PacketEnricher,
    modules: HashMap<DeviceId, String>,
    ingress: StreamMap<DeviceId, ReceiverStream<Value>>,
}

impl Distributor {
    /// Create a distributor and the handle that controls it.
    ///
    /// # Errors
    ///
    /// `RouterError::Config` if `config` does not validate.
    pub fn new(
        host: impl Into<Arc<HostIdentity>>,
        config: RouterConfig,
    ) -> Result<(Self, RouterHandle), RouterError> {
        Self::with_recorder(host, config, Arc::new(NoOpMetrics))
    }

    /// Like [`Distributor::new`], also reporting to an external recorder.
    ///
    /// # Errors
    ///
    /// `RouterError::Config` if `config` does not validate.
    pub fn with_recorder(
        host: impl Into<Arc<HostIdentity>>,
        config: RouterConfig,
        recorder: Arc<dyn MetricsRecorder>,
    ) -> Result<(Self, RouterHandle), RouterError> {
        config.validate()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RouterState {
            host: host.into(),
            config,
            registry: RwLock::new(SubscriptionRegistry::new()),
            statistics: StatisticsTracker::new(),
            outboxes: RwLock::new(HashMap::new()),
            producers: RwLock::new(HashMap::new()),
            metrics: Metrics::new(),
            recorder,
            shutdown: shutdown_tx,
        });

        let distributor = Self {
            state: Arc::clone(&state),
            commands: command_rx,
            shutdown: shutdown_rx,
            enricher: PacketEnricher::new(),
            modules: HashMap::new(),
            ingress: StreamMap::new(),
        };
        Ok((distributor, RouterHandle::new(state, command_tx)))
    }

    /// Create a distributor and run it on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// `RouterError::Config` if `config` does not validate.
    pub fn spawn(
        host: impl Into<Arc<HostIdentity>>,
        config: RouterConfig,
    ) -> Result<(RouterHandle, JoinHandle<()>), RouterError> {
        let (distributor, handle) = Self::new(host, config)?;
        Ok((handle, tokio::spawn(distributor.run())))
    }

    /// Route packets until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        info!(host = %self.state.host, "Distributor started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let event = tokio::select! {
                biased;
                changed = self.shutdown.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => Event::Stop,
                },
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::Stop,
                },
                Some((device, raw)) = self.ingress.next(), if !self.ingress.is_empty() => {
                    Event::Payload(device, raw)
                }
            };

            match event {
                Event::Stop => break,
                Event::Command(command) => self.apply(command),
                Event::Payload(device, raw) => self.process(device, raw).await,
            }
        }

        // Close both sides: producers see Closed, consumers drain then end.
        self.ingress = StreamMap::new();
        self.state.outboxes.write().clear();
        self.state.shutdown.send_replace(true);
        info!(host = %self.state.host, "Distributor stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::AttachProducer {
                device,
                device_module,
                receiver,
            } => {
                debug!(device = %device, device_module = %device_module, "Producer queue attached");
                self.modules.insert(device.clone(), device_module);
                self.ingress.insert(device, ReceiverStream::new(receiver));
            }
            Command::DetachProducer { device } => {
                debug!(device = %device, "Producer queue detached");
                self.modules.remove(&device);
                self.ingress.remove(&device);
            }
        }
    }

    async fn process(&mut self, device: DeviceId, raw: Value) {
        let received_at = Utc::now();
        self.state.on_metrics(|m| m.record_received());

        let device_module = self.modules.get(&device).cloned().unwrap_or_default();
        let packet = match self
            .enricher
            .enrich(raw, &device, &device_module, &self.state.host, received_at)
        {
            Ok(packet) => Arc::new(packet),
            Err(e) => {
                warn!(device = %device, error = %e, "Payload rejected");
                self.state.statistics.record_rejected(&device);
                self.state.on_metrics(|m| m.record_rejected());
                return;
            }
        };

        let keys = extract_key_paths(&packet.payload, true);
        let targets = self.state.registry.read().route_targets_with(&packet, &keys.tree);
        trace!(
            device = %device,
            packet_number = packet.packet_number(),
            targets = targets.len(),
            "Routing packet"
        );

        let mut delivered = 0;
        for target in &targets {
            match self.deliver(target, &packet).await {
                Delivery::Delivered => delivered += 1,
                Delivery::Dropped => {
                    warn!(
                        subscriber = %target,
                        device = %device,
                        packet_number = packet.packet_number(),
                        "Subscriber queue full, packet dropped"
                    );
                    self.state.statistics.record_drop(target);
                    self.state.on_metrics(|m| m.record_dropped());
                }
                Delivery::Closed(used) => {
                    self.state.retire_consumer_if(target, &used);
                }
                Delivery::Missing => {
                    debug!(subscriber = %target, "No queue for subscriber, skipped");
                }
            }
        }

        let stat_paths = if self.state.config.expand_statistics_keys {
            keys.ordered
        } else {
            extract_key_paths(&packet.payload, false).ordered
        };
        self.state.statistics.record(&packet, &stat_paths);
        self.state.on_metrics(|m| m.record_routed(delivered));
    }

    async fn deliver(&self, target: &str, packet: &PacketRef) -> Delivery {
        let sender = self.state.outboxes.read().get(target).cloned();
        let Some(sender) = sender else {
            return Delivery::Missing;
        };
        match sender
            .send_timeout(Arc::clone(packet), self.state.config.delivery_timeout)
            .await
        {
            Ok(()) => Delivery::Delivered,
            Err(SendTimeoutError::Timeout(_)) => Delivery::Dropped,
            Err(SendTimeoutError::Closed(_)) => Delivery::Closed(sender),
        }
    }
}
