//! Ports Layer
//!
//! Driving ports: the surfaces devices, dashboards and relays use to talk to
//! the router.

pub mod inbound;

pub use inbound::{PacketIngress, StatisticsQuery, SubscriptionApi};
