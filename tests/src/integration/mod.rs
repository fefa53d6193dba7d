//! # Integration Flows
//!
//! Each module drives one or more routers end to end through their public
//! handles. Shared fixtures live here.

pub mod aggregation;
pub mod backpressure;
pub mod fanout;
pub mod federation;

use std::time::Duration;

use chrono::Utc;
use shared_types::HostIdentity;

/// Upper bound for any single receive in these flows.
pub const WAIT: Duration = Duration::from_secs(2);

/// Host with a predictable uuid (`<name>-uuid`).
pub fn host(name: &str) -> HostIdentity {
    HostIdentity::with_uuid(name, format!("{name}-uuid"), Utc::now())
}

/// Poll `check` until it holds or [`WAIT`] elapses.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
