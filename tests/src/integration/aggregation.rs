//! # Statistics Aggregation Flows
//!
//! Statistics gathered while packets flow, queried through the read-only
//! port. Covers:
//!
//! 1. Per-(host, device, key) counters and last-seen times
//! 2. Sequence handling of the statistics key set
//! 3. Relayed traffic counted under the receiving host
//! 4. Summaries, datakeys and explicit reset

#[cfg(test)]
mod tests {
    use packet_router::{
        spawn_relay, Distributor, RouterConfig, RouterHandle, StatKey, StatisticsQuery,
    };
    use serde_json::json;

    use crate::integration::{eventually, host};

    fn key(host_uuid: &str, device: &str, path: &str) -> StatKey {
        StatKey {
            host_uuid: host_uuid.to_string(),
            device: device.to_string(),
            key_path: path.to_string(),
        }
    }

    fn packets_recorded(router: &RouterHandle) -> u64 {
        router.summary().devices.iter().map(|d| d.packets).sum()
    }

    #[tokio::test]
    async fn test_counters_per_device_and_key() {
        let (router, _task) = Distributor::spawn(host("lab"), RouterConfig::default()).unwrap();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let gps = router.register_producer("gps", "nmea").unwrap();

        ctd.submit(json!({"temp": 1, "cond": 2})).await.unwrap();
        ctd.submit(json!({"temp": 3})).await.unwrap();
        gps.submit(json!({"fix": {"lat": 54.0, "lon": 10.0}})).await.unwrap();

        assert!(eventually(|| packets_recorded(&router) == 3).await);

        let query: &dyn StatisticsQuery = &router;
        let snapshot = query.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[&key("lab-uuid", "ctd", "temp")].count, 2);
        assert_eq!(snapshot[&key("lab-uuid", "ctd", "cond")].count, 1);
        assert_eq!(snapshot[&key("lab-uuid", "gps", "fix/lat")].count, 1);
        assert!(
            snapshot[&key("lab-uuid", "ctd", "temp")].last_seen
                >= snapshot[&key("lab-uuid", "ctd", "cond")].last_seen
        );

        let keys: Vec<_> = router.datakeys("gps").into_iter().collect();
        assert_eq!(keys, ["fix/lat", "fix/lon"]);

        let summary = query.summary();
        assert_eq!(summary.keys, 4);
        let ctd_summary = summary.devices.iter().find(|d| d.device == "ctd").unwrap();
        assert_eq!(ctd_summary.packets, 2);
        assert_eq!(ctd_summary.last_packet_number, 1);
        assert_eq!(ctd_summary.host_name, "lab");
        assert!(ctd_summary.first_seen <= ctd_summary.last_seen);
    }

    #[tokio::test]
    async fn test_sequences_are_single_keys_unless_expanded() {
        let (compact, _a) = Distributor::spawn(host("lab"), RouterConfig::default()).unwrap();
        let (expanded, _b) = Distributor::spawn(
            host("ship"),
            RouterConfig::default().with_expanded_statistics_keys(true),
        )
        .unwrap();

        for router in [&compact, &expanded] {
            let adcp = router.register_producer("adcp", "rdi").unwrap();
            adcp.submit(json!({"z": [1, 2, 3, 4]})).await.unwrap();
        }

        assert!(eventually(|| packets_recorded(&compact) == 1).await);
        assert!(eventually(|| packets_recorded(&expanded) == 1).await);

        let compact_keys: Vec<_> = compact.datakeys("adcp").into_iter().collect();
        assert_eq!(compact_keys, ["z"]);
        let expanded_keys: Vec<_> = expanded.datakeys("adcp").into_iter().collect();
        assert_eq!(expanded_keys, ["z/0", "z/1", "z/2", "z/3"]);
    }

    #[tokio::test]
    async fn test_relayed_traffic_counted_per_host() {
        let (lab, _a) = Distributor::spawn(host("lab"), RouterConfig::default()).unwrap();
        let (ship, _b) = Distributor::spawn(host("ship"), RouterConfig::default()).unwrap();

        let ctd = lab.register_producer("ctd", "seabird").unwrap();
        let outbound = lab.register_consumer("to_ship").unwrap();
        lab.connect_as_provider("ctd", "to_ship").unwrap();
        spawn_relay(outbound, ship.register_producer("from_lab", "relay").unwrap());

        for n in 0..3 {
            ctd.submit(json!({"n": n})).await.unwrap();
        }

        assert!(eventually(|| packets_recorded(&ship) == 3).await);
        assert_eq!(packets_recorded(&lab), 3);

        let lab_snapshot = lab.snapshot();
        let ship_snapshot = ship.snapshot();
        assert_eq!(lab_snapshot[&key("lab-uuid", "ctd", "n")].count, 3);
        assert_eq!(ship_snapshot[&key("ship-uuid", "from_lab", "n")].count, 3);
        assert!(!ship_snapshot.contains_key(&key("lab-uuid", "ctd", "n")));
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy_and_reset_clears() {
        let (router, _task) = Distributor::spawn(host("lab"), RouterConfig::default()).unwrap();
        let ctd = router.register_producer("ctd", "seabird").unwrap();

        ctd.submit(json!({"temp": 1})).await.unwrap();
        assert!(eventually(|| packets_recorded(&router) == 1).await);
        let before = router.snapshot();

        ctd.submit(json!({"temp": 2})).await.unwrap();
        assert!(eventually(|| packets_recorded(&router) == 2).await);
        assert_eq!(before[&key("lab-uuid", "ctd", "temp")].count, 1);

        router.reset_statistics();
        assert!(router.snapshot().is_empty());
        assert_eq!(router.summary().keys, 0);

        // Packet numbers are owned by the enricher and keep counting.
        let mut plot = router.register_consumer("plot").unwrap();
        router.connect_as_provider("ctd", "plot").unwrap();
        ctd.submit(json!({"temp": 3})).await.unwrap();
        let packet = plot.poll(crate::integration::WAIT).await.unwrap();
        assert_eq!(packet.packet_number(), 2);
    }
}
