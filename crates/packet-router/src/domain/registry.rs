//! # Subscription Registry
//!
//! Who exists, who wants what, and which producers feed which consumers.
//!
//! - Devices register as producers (with a device module), consumers, or both
//! - A subscription binds a consumer to one address pattern
//! - A provider edge `producer -> consumer` is an implicit subscription of the
//!   consumer to every key of the producer
//!
//! The registry is plain data. The distributor keeps it behind a
//! reader-biased lock: routing takes the read side for every packet while
//! subscribe/unsubscribe take the write side briefly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::{DeviceId, EnrichedPacket};
use tracing::debug;

use super::address::{AddressPattern, AXIS_DELIMITER};
use super::key_path::{extract_key_paths, KeyTree, SEPARATOR};
use crate::error::RouterError;

/// Opaque id of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A consumer's interest in one address pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub subscriber: DeviceId,
    pub pattern: AddressPattern,
    /// Installed by a provider edge rather than an explicit subscribe.
    pub implicit: bool,
}

/// One registered device and its roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEntry {
    pub id: DeviceId,
    /// Device type identifier, set when registered as producer.
    pub device_module: Option<String>,
    pub producer: bool,
    pub consumer: bool,
}

impl DeviceEntry {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            device_module: None,
            producer: false,
            consumer: false,
        }
    }
}

/// Devices, subscriptions and provider edges.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    devices: BTreeMap<DeviceId, DeviceEntry>,
    subscriptions: BTreeMap<SubscriptionHandle, Subscription>,
    /// consumer -> producer -> implicit subscription
    providers: BTreeMap<DeviceId, BTreeMap<DeviceId, SubscriptionHandle>>,
    next_handle: u64,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // DEVICES
    // =========================================================================

    /// Check that a device id can appear on the device axis of a pattern.
    ///
    /// # Errors
    ///
    /// `RouterError::InvalidDeviceId` for empty ids or ids containing `@`,
    /// `/` or `*`.
    pub fn validate_device_id(id: &str) -> Result<(), RouterError> {
        let reason = if id.is_empty() {
            "must not be empty"
        } else if id.contains(AXIS_DELIMITER) {
            "must not contain `@`"
        } else if id.contains(SEPARATOR) {
            "must not contain `/`"
        } else if id.contains('*') {
            "must not contain `*`"
        } else {
            return Ok(());
        };
        Err(RouterError::InvalidDeviceId {
            device: id.to_string(),
            reason,
        })
    }

    /// Register `id` as a producer.
    ///
    /// # Errors
    ///
    /// - `RouterError::InvalidDeviceId` if the id is unusable
    /// - `RouterError::DuplicateDevice` if already a producer
    pub fn register_producer(&mut self, id: &str, device_module: &str) -> Result<(), RouterError> {
        Self::validate_device_id(id)?;
        let entry = self
            .devices
            .entry(id.to_string())
            .or_insert_with(|| DeviceEntry::new(id));
        if entry.producer {
            return Err(RouterError::DuplicateDevice {
                device: id.to_string(),
                role: "producer",
            });
        }
        entry.producer = true;
        entry.device_module = Some(device_module.to_string());
        Ok(())
    }

    /// Register `id` as a consumer.
    ///
    /// # Errors
    ///
    /// - `RouterError::InvalidDeviceId` if the id is unusable
    /// - `RouterError::DuplicateDevice` if already a consumer
    pub fn register_consumer(&mut self, id: &str) -> Result<(), RouterError> {
        Self::validate_device_id(id)?;
        let entry = self
            .devices
            .entry(id.to_string())
            .or_insert_with(|| DeviceEntry::new(id));
        if entry.consumer {
            return Err(RouterError::DuplicateDevice {
                device: id.to_string(),
                role: "consumer",
            });
        }
        entry.consumer = true;
        Ok(())
    }

    /// Remove a device in every role, with its subscriptions and every
    /// provider edge it takes part in.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownDevice` if nothing is registered under `id`.
    pub fn unregister(&mut self, id: &str) -> Result<DeviceEntry, RouterError> {
        let entry = self
            .devices
            .remove(id)
            .ok_or_else(|| RouterError::UnknownDevice(id.to_string()))?;
        self.drop_consumer_state(id);
        self.drop_producer_edges(id);
        Ok(entry)
    }

    /// Drop the consumer role of `id` after its queue went away.
    ///
    /// Keeps the device if it is also a producer. Returns the number of
    /// subscriptions removed.
    pub fn retire_consumer(&mut self, id: &str) -> usize {
        let Some(entry) = self.devices.get_mut(id) else {
            return 0;
        };
        entry.consumer = false;
        if !entry.producer {
            self.devices.remove(id);
        }
        self.drop_consumer_state(id)
    }

    /// Drop the producer role of `id` and every provider edge it feeds.
    ///
    /// Keeps the device if it is also a consumer.
    pub fn retire_producer(&mut self, id: &str) {
        let Some(entry) = self.devices.get_mut(id) else {
            return;
        };
        entry.producer = false;
        entry.device_module = None;
        if !entry.consumer {
            self.devices.remove(id);
        }
        self.drop_producer_edges(id);
    }

    /// Entry for one device.
    #[must_use]
    pub fn device(&self, id: &str) -> Option<&DeviceEntry> {
        self.devices.get(id)
    }

    /// Every registered device, ordered by id.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.values()
    }

    fn is_producer(&self, id: &str) -> bool {
        self.devices.get(id).is_some_and(|d| d.producer)
    }

    fn is_consumer(&self, id: &str) -> bool {
        self.devices.get(id).is_some_and(|d| d.consumer)
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Subscribe a consumer to a pattern.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscriber` if `subscriber` is not a consumer.
    pub fn subscribe(
        &mut self,
        subscriber: &str,
        pattern: AddressPattern,
    ) -> Result<SubscriptionHandle, RouterError> {
        if !self.is_consumer(subscriber) {
            return Err(RouterError::UnknownSubscriber(subscriber.to_string()));
        }
        Ok(self.insert(subscriber, pattern, false))
    }

    /// Remove one subscription. Removing an implicit subscription also
    /// removes its provider edge.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscription` if the handle is not registered.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<Subscription, RouterError> {
        let subscription = self
            .subscriptions
            .remove(&handle)
            .ok_or(RouterError::UnknownSubscription(handle))?;
        if subscription.implicit {
            if let Some(edges) = self.providers.get_mut(&subscription.subscriber) {
                edges.retain(|_, edge| *edge != handle);
                if edges.is_empty() {
                    self.providers.remove(&subscription.subscriber);
                }
            }
        }
        Ok(subscription)
    }

    /// Subscriptions held by one consumer.
    #[must_use]
    pub fn subscriptions_of(&self, subscriber: &str) -> Vec<&Subscription> {
        self.subscriptions
            .values()
            .filter(|s| s.subscriber == subscriber)
            .collect()
    }

    /// Total number of subscriptions, implicit ones included.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // =========================================================================
    // PROVIDER EDGES
    // =========================================================================

    /// Connect `producer` as a provider of `consumer`.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` - edge created
    /// - `Ok(false)` - already connected, nothing changed
    ///
    /// # Errors
    ///
    /// - `RouterError::UnknownProducer` if `producer` is not a producer
    /// - `RouterError::UnknownSubscriber` if `consumer` is not a consumer
    pub fn connect_as_provider(&mut self, producer: &str, consumer: &str) -> Result<bool, RouterError> {
        if !self.is_producer(producer) {
            return Err(RouterError::UnknownProducer(producer.to_string()));
        }
        if !self.is_consumer(consumer) {
            return Err(RouterError::UnknownSubscriber(consumer.to_string()));
        }
        if self
            .providers
            .get(consumer)
            .is_some_and(|edges| edges.contains_key(producer))
        {
            return Ok(false);
        }

        let handle = self.insert(consumer, AddressPattern::for_device(producer), true);
        self.providers
            .entry(consumer.to_string())
            .or_default()
            .insert(producer.to_string(), handle);
        Ok(true)
    }

    /// Remove a provider edge and its implicit subscription.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the two devices were not connected.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscriber` if `consumer` is not a consumer.
    pub fn disconnect_provider(&mut self, producer: &str, consumer: &str) -> Result<bool, RouterError> {
        if !self.is_consumer(consumer) {
            return Err(RouterError::UnknownSubscriber(consumer.to_string()));
        }
        let handle = self
            .providers
            .get(consumer)
            .and_then(|edges| edges.get(producer))
            .copied();
        match handle {
            Some(handle) => self.unsubscribe(handle).map(|_| true),
            None => Ok(false),
        }
    }

    /// Producers connected to `consumer`.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscriber` if `consumer` is not a consumer.
    pub fn providers_of(&self, consumer: &str) -> Result<BTreeSet<DeviceId>, RouterError> {
        if !self.is_consumer(consumer) {
            return Err(RouterError::UnknownSubscriber(consumer.to_string()));
        }
        Ok(self
            .providers
            .get(consumer)
            .map(|edges| edges.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Every registered producer.
    #[must_use]
    pub fn list_providers(&self) -> Vec<DeviceEntry> {
        self.devices.values().filter(|d| d.producer).cloned().collect()
    }

    // =========================================================================
    // ROUTING
    // =========================================================================

    /// Consumers interested in a packet, each once.
    #[must_use]
    pub fn route_targets(&self, packet: &EnrichedPacket) -> BTreeSet<DeviceId> {
        let keys = extract_key_paths(&packet.payload, true);
        self.route_targets_with(packet, &keys.tree)
    }

    /// [`Self::route_targets`] with a path tree the caller already built.
    ///
    /// A device never receives packets it produced itself.
    #[must_use]
    pub fn route_targets_with(&self, packet: &EnrichedPacket, tree: &KeyTree) -> BTreeSet<DeviceId> {
        let mut targets = BTreeSet::new();
        for subscription in self.subscriptions.values() {
            if subscription.subscriber == packet.device() || targets.contains(&subscription.subscriber) {
                continue;
            }
            let pattern = &subscription.pattern;
            if pattern.matches_origin(packet.device(), packet.host()) && pattern.matches_tree(tree) {
                targets.insert(subscription.subscriber.clone());
            }
        }
        targets
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn insert(&mut self, subscriber: &str, pattern: AddressPattern, implicit: bool) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        debug!(subscriber, %pattern, %handle, implicit, "Subscription added");
        self.subscriptions.insert(
            handle,
            Subscription {
                handle,
                subscriber: subscriber.to_string(),
                pattern,
                implicit,
            },
        );
        handle
    }

    /// Remove every subscription and provider edge held by consumer `id`.
    fn drop_consumer_state(&mut self, id: &str) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, s| s.subscriber != id);
        self.providers.remove(id);
        before - self.subscriptions.len()
    }

    /// Remove every provider edge where `id` is the producer.
    fn drop_producer_edges(&mut self, id: &str) {
        let mut stale = Vec::new();
        for edges in self.providers.values_mut() {
            if let Some(handle) = edges.remove(id) {
                stale.push(handle);
            }
        }
        self.providers.retain(|_, edges| !edges.is_empty());
        for handle in stale {
            self.subscriptions.remove(&handle);
        }
    }
}
