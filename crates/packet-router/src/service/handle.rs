//! # Router Handle
//!
//! Cheap, cloneable control surface for a running [`Distributor`].
//!
//! [`Distributor`]: super::Distributor

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shared_bus::{consumer_channel, ingress_channel, ConsumerHandle, ProducerHandle};
use shared_types::{DeviceId, HostIdentity};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::distributor::{Command, RouterState};
use crate::config::RouterConfig;
use crate::domain::{
    AddressPattern, DeviceEntry, StatEntry, StatKey, StatisticsSummary, Subscription,
    SubscriptionHandle,
};
use crate::error::RouterError;
use crate::metrics::MetricsSnapshot;
use crate::ports::{PacketIngress, StatisticsQuery, SubscriptionApi};

/// Control surface for registration, subscriptions, ingress and statistics.
///
/// The distributor stops once every clone has been dropped.
#[derive(Clone)]
pub struct RouterHandle {
    pub(crate) state: Arc<RouterState>,
    commands: mpsc::UnboundedSender<Command>,
}

impl RouterHandle {
    pub(crate) fn new(state: Arc<RouterState>, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { state, commands }
    }

    /// Identity of this instance.
    #[must_use]
    pub fn host(&self) -> &Arc<HostIdentity> {
        &self.state.host
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.state.config
    }

    // =========================================================================
    // DEVICES
    // =========================================================================

    /// Register a producing device and get its ingress queue.
    ///
    /// # Errors
    ///
    /// - `RouterError::InvalidDeviceId` / `RouterError::DuplicateDevice`
    /// - `RouterError::ShutDown` if the distributor stopped
    pub fn register_producer(&self, id: &str, device_module: &str) -> Result<ProducerHandle, RouterError> {
        self.ensure_running()?;
        self.state.registry.write().register_producer(id, device_module)?;

        let (producer, receiver) = ingress_channel(
            id,
            self.state.config.ingress_capacity,
            self.state.config.submit_timeout,
        );
        let attach = Command::AttachProducer {
            device: id.to_string(),
            device_module: device_module.to_string(),
            receiver,
        };
        if self.commands.send(attach).is_err() {
            self.state.registry.write().retire_producer(id);
            return Err(RouterError::ShutDown);
        }

        self.state
            .producers
            .write()
            .insert(id.to_string(), producer.clone());
        info!(device = id, device_module, "Producer registered");
        Ok(producer)
    }

    /// Register a consuming device and get its inbound queue.
    ///
    /// A consumer whose previous handle was dropped is retired first, so the
    /// id can be reused right away.
    ///
    /// # Errors
    ///
    /// - `RouterError::InvalidDeviceId` / `RouterError::DuplicateDevice`
    /// - `RouterError::ShutDown` if the distributor stopped
    pub fn register_consumer(&self, id: &str) -> Result<ConsumerHandle, RouterError> {
        self.ensure_running()?;
        let stale = self
            .state
            .outboxes
            .read()
            .get(id)
            .filter(|sender| sender.is_closed())
            .cloned();
        if let Some(stale) = stale {
            self.state.retire_consumer_if(id, &stale);
        }

        self.state.registry.write().register_consumer(id)?;
        let (sender, consumer) = consumer_channel(id, self.state.config.consumer_capacity);
        self.state.outboxes.write().insert(id.to_string(), sender);
        info!(consumer = id, "Consumer registered");
        Ok(consumer)
    }

    /// Remove a device in every role, with its subscriptions and provider
    /// edges. Its queues are closed.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownDevice` if nothing is registered under `id`.
    pub fn unregister_device(&self, id: &str) -> Result<DeviceEntry, RouterError> {
        let entry = self.state.registry.write().unregister(id)?;
        self.state.outboxes.write().remove(id);
        if self.state.producers.write().remove(id).is_some() {
            let detach = Command::DetachProducer {
                device: id.to_string(),
            };
            if self.commands.send(detach).is_err() {
                debug!(device = id, "Distributor already stopped");
            }
        }
        info!(device = id, "Device unregistered");
        Ok(entry)
    }

    /// Entry for one device.
    #[must_use]
    pub fn device(&self, id: &str) -> Option<DeviceEntry> {
        self.state.registry.read().device(id).cloned()
    }

    /// Every registered device, ordered by id.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceEntry> {
        self.state.registry.read().devices().cloned().collect()
    }

    // =========================================================================
    // INGRESS
    // =========================================================================

    /// Submit a raw payload for a registered producer, waiting briefly for
    /// room in its queue.
    ///
    /// # Errors
    ///
    /// - `RouterError::UnknownProducer` if `device` is not a producer
    /// - `RouterError::QueueFull` if no room appeared in time (recoverable)
    /// - `RouterError::ShutDown` if the distributor stopped
    pub async fn submit(&self, device: &str, payload: Value) -> Result<(), RouterError> {
        let producer = self.producer(device)?;
        producer.submit(payload).await.map_err(RouterError::from)
    }

    /// Submit without waiting.
    ///
    /// # Errors
    ///
    /// Same as [`RouterHandle::submit`].
    pub fn try_submit(&self, device: &str, payload: Value) -> Result<(), RouterError> {
        self.producer(device)?
            .try_submit(payload)
            .map_err(RouterError::from)
    }

    fn producer(&self, device: &str) -> Result<ProducerHandle, RouterError> {
        self.state
            .producers
            .read()
            .get(device)
            .cloned()
            .ok_or_else(|| RouterError::UnknownProducer(device.to_string()))
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Subscribe a consumer to a pattern string.
    ///
    /// # Errors
    ///
    /// - `RouterError::MalformedPattern` if the pattern does not parse
    /// - `RouterError::UnknownSubscriber` if `subscriber` is not a consumer
    pub fn subscribe(&self, subscriber: &str, pattern: &str) -> Result<SubscriptionHandle, RouterError> {
        self.subscribe_pattern(subscriber, AddressPattern::parse(pattern)?)
    }

    /// Subscribe a consumer to a parsed pattern.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscriber` if `subscriber` is not a consumer.
    pub fn subscribe_pattern(
        &self,
        subscriber: &str,
        pattern: AddressPattern,
    ) -> Result<SubscriptionHandle, RouterError> {
        let rendered = pattern.to_string();
        let handle = self.state.registry.write().subscribe(subscriber, pattern)?;
        info!(subscriber, pattern = %rendered, %handle, "Subscribed");
        Ok(handle)
    }

    /// Remove a subscription.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscription` if the handle is not registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<Subscription, RouterError> {
        let subscription = self.state.registry.write().unsubscribe(handle)?;
        info!(subscriber = %subscription.subscriber, %handle, "Unsubscribed");
        Ok(subscription)
    }

    /// Subscriptions held by one consumer.
    #[must_use]
    pub fn subscriptions_of(&self, subscriber: &str) -> Vec<Subscription> {
        self.state
            .registry
            .read()
            .subscriptions_of(subscriber)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Connect a producer to a consumer. `Ok(false)` means already connected.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownProducer` / `RouterError::UnknownSubscriber`.
    pub fn connect_as_provider(&self, producer: &str, consumer: &str) -> Result<bool, RouterError> {
        let created = self.state.registry.write().connect_as_provider(producer, consumer)?;
        if created {
            info!(producer, consumer, "Provider connected");
        }
        Ok(created)
    }

    /// Remove a provider edge. `Ok(false)` means they were not connected.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscriber` if `consumer` is not a consumer.
    pub fn disconnect_provider(&self, producer: &str, consumer: &str) -> Result<bool, RouterError> {
        let removed = self.state.registry.write().disconnect_provider(producer, consumer)?;
        if removed {
            info!(producer, consumer, "Provider disconnected");
        }
        Ok(removed)
    }

    /// Producers connected to a consumer.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscriber` if `consumer` is not a consumer.
    pub fn providers_of(&self, consumer: &str) -> Result<BTreeSet<DeviceId>, RouterError> {
        self.state.registry.read().providers_of(consumer)
    }

    /// Every registered producer.
    #[must_use]
    pub fn list_providers(&self) -> Vec<DeviceEntry> {
        self.state.registry.read().list_providers()
    }

    // =========================================================================
    // STATISTICS & METRICS
    // =========================================================================

    /// Point-in-time copy of every statistics entry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<StatKey, StatEntry> {
        self.state.statistics.snapshot()
    }

    #[must_use]
    pub fn summary(&self) -> StatisticsSummary {
        self.state.statistics.summary()
    }

    /// Key paths seen for a device, sorted.
    #[must_use]
    pub fn datakeys(&self, device: &str) -> BTreeSet<String> {
        self.state.statistics.datakeys(device)
    }

    /// Packets dropped across all subscribers.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.state.statistics.dropped_total()
    }

    /// Clear all statistics.
    pub fn reset_statistics(&self) {
        self.state.statistics.reset();
        info!("Statistics reset");
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.state.metrics.snapshot()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Ask the distributor to stop after the packet in flight.
    pub fn shutdown(&self) {
        if !self.state.shutdown.send_replace(true) {
            info!(host = %self.state.host, "Shutdown requested");
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.state.shutdown.borrow() || self.commands.is_closed()
    }

    fn ensure_running(&self) -> Result<(), RouterError> {
        if self.is_shut_down() {
            Err(RouterError::ShutDown)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PacketIngress for RouterHandle {
    async fn submit(&self, device: &str, payload: Value) -> Result<(), RouterError> {
        RouterHandle::submit(self, device, payload).await
    }

    fn try_submit(&self, device: &str, payload: Value) -> Result<(), RouterError> {
        RouterHandle::try_submit(self, device, payload)
    }
}

impl SubscriptionApi for RouterHandle {
    fn subscribe(&self, subscriber: &str, pattern: &str) -> Result<SubscriptionHandle, RouterError> {
        RouterHandle::subscribe(self, subscriber, pattern)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), RouterError> {
        RouterHandle::unsubscribe(self, handle).map(|_| ())
    }

    fn connect_as_provider(&self, producer: &str, consumer: &str) -> Result<bool, RouterError> {
        RouterHandle::connect_as_provider(self, producer, consumer)
    }

    fn providers_of(&self, consumer: &str) -> Result<BTreeSet<DeviceId>, RouterError> {
        RouterHandle::providers_of(self, consumer)
    }

    fn list_providers(&self) -> Vec<DeviceEntry> {
        RouterHandle::list_providers(self)
    }
}

impl StatisticsQuery for RouterHandle {
    fn snapshot(&self) -> BTreeMap<StatKey, StatEntry> {
        RouterHandle::snapshot(self)
    }

    fn summary(&self) -> StatisticsSummary {
        RouterHandle::summary(self)
    }
}
