//! # Statistics Tracker
//!
//! Per-(host, device, key path) counters and last-seen times, plus
//! per-device summaries and drop/reject counters.
//!
//! Entries are never removed except by an explicit [`StatisticsTracker::reset`].
//! Snapshots are point-in-time copies taken under a short read lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{DeviceId, EnrichedPacket};

/// (host uuid, device, data key path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatKey {
    pub host_uuid: String,
    pub device: DeviceId,
    pub key_path: String,
}

/// Count and most recent receive time for one [`StatKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

/// Packets seen from one device on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub host_uuid: String,
    pub host_name: String,
    pub device: DeviceId,
    pub packets: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_packet_number: u64,
}

/// Aggregate view for dashboards and reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    /// Ordered by (host uuid, device).
    pub devices: Vec<DeviceSummary>,
    /// Number of distinct stat keys.
    pub keys: usize,
    /// Packets dropped per subscriber because its queue stayed full.
    pub dropped: BTreeMap<DeviceId, u64>,
    pub dropped_total: u64,
    /// Payloads rejected at enrichment per producing device.
    pub rejected: BTreeMap<DeviceId, u64>,
    pub rejected_total: u64,
}

#[derive(Debug, Default)]
struct StatsState {
    entries: HashMap<StatKey, StatEntry>,
    devices: HashMap<(String, DeviceId), DeviceSummary>,
    dropped: HashMap<DeviceId, u64>,
    rejected: HashMap<DeviceId, u64>,
}

/// Thread-safe statistics store.
///
/// The routing loop is the only writer; any number of readers may snapshot.
#[derive(Debug, Default)]
pub struct StatisticsTracker {
    state: RwLock<StatsState>,
}

impl StatisticsTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one packet against each of its key paths.
    ///
    /// `last_seen` is the packet's receive time and never moves backwards.
    pub fn record(&self, packet: &EnrichedPacket, key_paths: &[String]) {
        let host = packet.host();
        let at = packet.received_at();
        let mut state = self.state.write();

        for path in key_paths {
            let key = StatKey {
                host_uuid: host.uuid.clone(),
                device: packet.device().to_string(),
                key_path: path.clone(),
            };
            state
                .entries
                .entry(key)
                .and_modify(|entry| {
                    entry.count += 1;
                    entry.last_seen = entry.last_seen.max(at);
                })
                .or_insert(StatEntry {
                    count: 1,
                    last_seen: at,
                });
        }

        state
            .devices
            .entry((host.uuid.clone(), packet.device().to_string()))
            .and_modify(|summary| {
                summary.packets += 1;
                summary.last_seen = summary.last_seen.max(at);
                summary.last_packet_number = packet.packet_number();
            })
            .or_insert_with(|| DeviceSummary {
                host_uuid: host.uuid.clone(),
                host_name: host.name.clone(),
                device: packet.device().to_string(),
                packets: 1,
                first_seen: at,
                last_seen: at,
                last_packet_number: packet.packet_number(),
            });
    }

    /// Count one packet dropped for `subscriber`.
    pub fn record_drop(&self, subscriber: &str) {
        *self
            .state
            .write()
            .dropped
            .entry(subscriber.to_string())
            .or_insert(0) += 1;
    }

    /// Count one payload from `device` rejected at enrichment.
    pub fn record_rejected(&self, device: &str) {
        *self
            .state
            .write()
            .rejected
            .entry(device.to_string())
            .or_insert(0) += 1;
    }

    /// Point-in-time copy of every entry, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<StatKey, StatEntry> {
        let state = self.state.read();
        state
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), *entry))
            .collect()
    }

    /// Entry for one key.
    #[must_use]
    pub fn get(&self, key: &StatKey) -> Option<StatEntry> {
        self.state.read().entries.get(key).copied()
    }

    /// Aggregate summary.
    #[must_use]
    pub fn summary(&self) -> StatisticsSummary {
        let state = self.state.read();
        let mut devices: Vec<DeviceSummary> = state.devices.values().cloned().collect();
        devices.sort_by(|a, b| (&a.host_uuid, &a.device).cmp(&(&b.host_uuid, &b.device)));

        StatisticsSummary {
            devices,
            keys: state.entries.len(),
            dropped: state.dropped.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            dropped_total: state.dropped.values().sum(),
            rejected: state.rejected.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            rejected_total: state.rejected.values().sum(),
        }
    }

    /// Key paths seen for a device on any host, sorted.
    #[must_use]
    pub fn datakeys(&self, device: &str) -> BTreeSet<String> {
        self.state
            .read()
            .entries
            .keys()
            .filter(|key| key.device == device)
            .map(|key| key.key_path.clone())
            .collect()
    }

    /// Packets dropped across all subscribers.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.state.read().dropped.values().sum()
    }

    /// Packets dropped for one subscriber.
    #[must_use]
    pub fn dropped_for(&self, subscriber: &str) -> u64 {
        self.state.read().dropped.get(subscriber).copied().unwrap_or(0)
    }

    /// Clear every counter.
    pub fn reset(&self) {
        *self.state.write() = StatsState::default();
    }
}
