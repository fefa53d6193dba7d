//! # Federation Flows
//!
//! Packets crossing router instances. Covers:
//!
//! 1. Provenance growing by one entry per hop, oldest first
//! 2. Per-(device, host) numbering restarting on every hub
//! 3. The host axis following the most recent enricher
//! 4. Wire form carrying metadata between hubs

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use packet_router::{spawn_relay, Distributor, PacketEnricher, RouterConfig, RouterHandle};
    use serde_json::json;
    use shared_types::{EnrichedPacket, META_KEY};

    use crate::integration::{host, WAIT};

    fn hub(name: &str) -> RouterHandle {
        let (router, _task) = Distributor::spawn(host(name), RouterConfig::default()).unwrap();
        router
    }

    /// Forward everything `device` produces on `from` into a producer named
    /// `inbound` on `to`.
    fn link(from: &RouterHandle, device: &str, to: &RouterHandle, inbound: &str) {
        let outbound_id = format!("to_{}", to.host().name);
        let outbound = from.register_consumer(&outbound_id).unwrap();
        from.connect_as_provider(device, &outbound_id).unwrap();
        let upstream = to.register_producer(inbound, "relay").unwrap();
        spawn_relay(outbound, upstream);
    }

    #[tokio::test]
    async fn test_two_hop_provenance_chain() {
        let lab = hub("lab");
        let ship = hub("ship");
        let shore = hub("shore");

        let ctd = lab.register_producer("ctd", "seabird").unwrap();
        link(&lab, "ctd", &ship, "from_lab");
        link(&ship, "from_lab", &shore, "from_ship");

        let mut archive = shore.register_consumer("archive").unwrap();
        shore.connect_as_provider("from_ship", "archive").unwrap();

        ctd.submit(json!({"temp": 9.5})).await.unwrap();
        ctd.submit(json!({"temp": 9.6})).await.unwrap();

        let first = archive.poll(WAIT).await.unwrap();
        assert_eq!(first.host().name, "shore");
        assert_eq!(first.device(), "from_ship");
        assert_eq!(first.device_module(), "relay");
        assert_eq!(first.hop_count(), 2);

        let hops: Vec<(&str, &str)> = first
            .provenance()
            .iter()
            .map(|p| (p.host.name.as_str(), p.device.as_str()))
            .collect();
        assert_eq!(hops, [("lab", "ctd"), ("ship", "from_lab")]);
        assert_eq!(first.origin_host().name, "lab");

        // The payload never carries the reserved key to consumers.
        assert!(!first.payload.contains_key(META_KEY));
        assert_eq!(first.payload["temp"], 9.5);

        let second = archive.poll(WAIT).await.unwrap();
        assert_eq!(second.packet_number(), 1);
        assert_eq!(second.provenance()[0].packet_number, 1);
        assert!(second.provenance()[0].received_at >= first.provenance()[0].received_at);
    }

    #[tokio::test]
    async fn test_host_axis_matches_latest_enricher() {
        let lab = hub("lab");
        let ship = hub("ship");

        let ctd = lab.register_producer("ctd", "seabird").unwrap();
        link(&lab, "ctd", &ship, "from_lab");

        let mut local = ship.register_consumer("local").unwrap();
        let mut by_origin = ship.register_consumer("by_origin").unwrap();
        ship.subscribe("local", "temp@from_lab@ship").unwrap();
        ship.subscribe("by_origin", "temp@*@lab").unwrap();

        ctd.submit(json!({"temp": 3})).await.unwrap();

        let packet = local.poll(WAIT).await.unwrap();
        assert_eq!(packet.provenance()[0].host.name, "lab");
        assert!(by_origin
            .poll(std::time::Duration::from_millis(50))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_raw_wire_submission_is_relayed() {
        let ship = hub("ship");
        let inbound = ship.register_producer("modem", "acoustic").unwrap();
        let mut plot = ship.register_consumer("plot").unwrap();
        ship.connect_as_provider("modem", "plot").unwrap();

        // A packet enriched somewhere else, arriving as plain JSON.
        let buoy = Arc::new(host("buoy"));
        let mut enricher = PacketEnricher::new();
        let remote = enricher
            .enrich(json!({"wave": 1.2}), "imu", "xsens", &buoy, Utc::now())
            .unwrap();
        let wire = remote.to_wire().unwrap();
        assert!(wire.get(META_KEY).is_some());

        inbound.submit(wire).await.unwrap();
        let packet = plot.poll(WAIT).await.unwrap();
        assert_eq!(packet.device(), "modem");
        assert_eq!(packet.provenance().len(), 1);
        assert_eq!(packet.provenance()[0].host.uuid, "buoy-uuid");
        assert_eq!(packet.provenance()[0].device, "imu");

        let round_trip = EnrichedPacket::from_wire(packet.to_wire().unwrap()).unwrap();
        assert_eq!(&round_trip, packet.as_ref());
    }

    #[tokio::test]
    async fn test_malformed_metadata_is_rejected() {
        let ship = hub("ship");
        let inbound = ship.register_producer("modem", "acoustic").unwrap();
        let mut plot = ship.register_consumer("plot").unwrap();
        ship.connect_as_provider("modem", "plot").unwrap();

        inbound
            .submit(json!({"wave": 1, "_packet": "garbage"}))
            .await
            .unwrap();
        inbound.submit(json!({"wave": 2})).await.unwrap();

        let packet = plot.poll(WAIT).await.unwrap();
        assert_eq!(packet.payload["wave"], 2);
        assert_eq!(packet.packet_number(), 0);
        assert!(crate::integration::eventually(|| ship.summary().rejected_total == 1).await);
    }

    #[test]
    fn test_in_process_relay_appends_first_hop() {
        let lab = Arc::new(host("lab"));
        let ship = Arc::new(host("ship"));
        let mut at_lab = PacketEnricher::new();
        let mut at_ship = PacketEnricher::new();

        let first = at_lab
            .enrich(json!({"x": 10}), "ctd", "seabird", &lab, Utc::now())
            .unwrap();
        let first_meta = first.meta.clone();
        let second = at_ship.relay(first, "from_lab", "relay", &ship, Utc::now());

        assert_eq!(second.provenance(), &[first_meta.as_provenance()]);
        assert_eq!(second.host().name, "ship");
        assert_eq!(second.device(), "from_lab");
        assert_eq!(second.packet_number(), 0);
        assert_eq!(at_ship.enriched_count("from_lab", "ship-uuid"), 1);
    }
}
