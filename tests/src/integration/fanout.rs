//! # Fan-out Flows
//!
//! One router, several producers and subscribers with overlapping
//! patterns. Covers:
//!
//! 1. Key, device and host axes deciding who receives a packet
//! 2. Subscribers selecting their subtree from a shared packet
//! 3. Provider edges and their bookkeeping
//! 4. Unsubscribe and consumer streams

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use packet_router::{
        AddressPattern, Distributor, RouterConfig, RouterError, RouterHandle, SubscriptionApi,
    };
    use serde_json::json;
    use shared_bus::ConsumerHandle;
    use tokio_stream::StreamExt;

    use crate::integration::{host, WAIT};

    const QUIET: Duration = Duration::from_millis(50);

    fn lab() -> RouterHandle {
        let (router, _task) = Distributor::spawn(host("lab"), RouterConfig::default()).unwrap();
        router
    }

    async fn expect_nothing(consumer: &mut ConsumerHandle) {
        assert!(consumer.poll(QUIET).await.is_none(), "{} got a packet", consumer.id());
    }

    // =========================================================================
    // AXES
    // =========================================================================

    #[tokio::test]
    async fn test_axes_decide_receivers() {
        let router = lab();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let gps = router.register_producer("gps", "nmea").unwrap();

        let mut everything = router.register_consumer("everything").unwrap();
        let mut temp_any = router.register_consumer("temp_any").unwrap();
        let mut from_gps = router.register_consumer("from_gps").unwrap();
        let mut elsewhere = router.register_consumer("elsewhere").unwrap();
        let mut on_lab = router.register_consumer("on_lab").unwrap();

        router.subscribe("everything", "*").unwrap();
        router.subscribe("temp_any", "temp").unwrap();
        router.subscribe("from_gps", "@gps").unwrap();
        router.subscribe("elsewhere", "temp@ctd@ship").unwrap();
        router.subscribe("on_lab", "temp@*@lab-uuid").unwrap();

        ctd.submit(json!({"temp": 11.2, "cond": 4.1})).await.unwrap();
        gps.submit(json!({"lat": 54.1, "lon": 10.2})).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(everything.poll(WAIT).await.unwrap().device().to_string());
        }
        seen.sort();
        assert_eq!(seen, ["ctd", "gps"]);

        assert_eq!(temp_any.poll(WAIT).await.unwrap().device(), "ctd");
        assert_eq!(from_gps.poll(WAIT).await.unwrap().device(), "gps");
        assert_eq!(on_lab.poll(WAIT).await.unwrap().device(), "ctd");

        expect_nothing(&mut temp_any).await;
        expect_nothing(&mut from_gps).await;
        expect_nothing(&mut elsewhere).await;
    }

    #[tokio::test]
    async fn test_one_delivery_per_subscriber_with_overlapping_patterns() {
        let router = lab();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let mut plot = router.register_consumer("plot").unwrap();
        router.subscribe("plot", "temp").unwrap();
        router.subscribe("plot", "*@ctd").unwrap();
        router.connect_as_provider("ctd", "plot").unwrap();

        ctd.submit(json!({"temp": 1})).await.unwrap();
        ctd.submit(json!({"temp": 2})).await.unwrap();

        assert_eq!(plot.poll(WAIT).await.unwrap().packet_number(), 0);
        assert_eq!(plot.poll(WAIT).await.unwrap().packet_number(), 1);
        expect_nothing(&mut plot).await;
    }

    #[tokio::test]
    async fn test_subscribers_share_one_packet_and_select_their_part() {
        let router = lab();
        let adcp = router.register_producer("adcp", "rdi").unwrap();
        let mut profile = router.register_consumer("profile").unwrap();
        let mut status = router.register_consumer("status").unwrap();

        let profile_pattern = AddressPattern::parse("u/a@adcp").unwrap();
        let status_pattern: AddressPattern = "u/b".parse().unwrap();
        router.subscribe_pattern("profile", profile_pattern.clone()).unwrap();
        router.subscribe_pattern("status", status_pattern.clone()).unwrap();

        adcp.submit(json!({"u": {"a": [5, 6, 7], "b": "Hello"}}))
            .await
            .unwrap();

        let a = profile.poll(WAIT).await.unwrap();
        let b = status.poll(WAIT).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        assert_eq!(
            serde_json::Value::Object(profile_pattern.select(&a)),
            json!({"u": {"a": [5, 6, 7]}})
        );
        assert_eq!(
            serde_json::Value::Object(status_pattern.select(&b)),
            json!({"u": {"b": "Hello"}})
        );
        assert_eq!(AddressPattern::universal().select(&a), a.payload);
    }

    #[tokio::test]
    async fn test_nested_wildcards() {
        let router = lab();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let mut salinity = router.register_consumer("salinity").unwrap();
        router.subscribe("salinity", "sensors/*/sal").unwrap();

        ctd.submit(json!({"sensors": {"primary": {"temp": 3}}}))
            .await
            .unwrap();
        ctd.submit(json!({"sensors": {"secondary": {"sal": 35.1}}}))
            .await
            .unwrap();

        let packet = salinity.poll(WAIT).await.unwrap();
        assert_eq!(packet.packet_number(), 1);
        expect_nothing(&mut salinity).await;
    }

    // =========================================================================
    // PROVIDER EDGES
    // =========================================================================

    #[tokio::test]
    async fn test_provider_edges() {
        let router = lab();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        router.register_producer("gps", "nmea").unwrap();
        let mut logger = router.register_consumer("logger").unwrap();

        assert_eq!(router.connect_as_provider("ctd", "logger"), Ok(true));
        assert_eq!(router.connect_as_provider("ctd", "logger"), Ok(false));
        assert_eq!(router.connect_as_provider("gps", "logger"), Ok(true));
        assert!(matches!(
            router.connect_as_provider("nope", "logger"),
            Err(RouterError::UnknownProducer(_))
        ));
        assert!(matches!(
            router.connect_as_provider("ctd", "nope"),
            Err(RouterError::UnknownSubscriber(_))
        ));

        let providers: Vec<_> = router.providers_of("logger").unwrap().into_iter().collect();
        assert_eq!(providers, ["ctd", "gps"]);
        let modules: Vec<_> = router
            .list_providers()
            .into_iter()
            .filter_map(|d| d.device_module)
            .collect();
        assert!(modules.contains(&"seabird".to_string()));
        assert!(modules.contains(&"nmea".to_string()));

        ctd.submit(json!({"temp": 4})).await.unwrap();
        assert_eq!(logger.poll(WAIT).await.unwrap().device(), "ctd");

        assert_eq!(router.disconnect_provider("ctd", "logger"), Ok(true));
        ctd.submit(json!({"temp": 5})).await.unwrap();
        expect_nothing(&mut logger).await;
    }

    // =========================================================================
    // SUBSCRIPTION LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let router = lab();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let mut plot = router.register_consumer("plot").unwrap();
        let handle = router.subscribe("plot", "temp").unwrap();

        ctd.submit(json!({"temp": 1})).await.unwrap();
        plot.poll(WAIT).await.unwrap();

        let api: &dyn SubscriptionApi = &router;
        api.unsubscribe(handle).unwrap();
        assert!(matches!(
            api.unsubscribe(handle),
            Err(RouterError::UnknownSubscription(_))
        ));

        ctd.submit(json!({"temp": 2})).await.unwrap();
        expect_nothing(&mut plot).await;
    }

    #[tokio::test]
    async fn test_subscription_errors_are_synchronous() {
        let router = lab();
        router.register_consumer("plot").unwrap();

        assert!(matches!(
            router.subscribe("plot", "a//b"),
            Err(RouterError::MalformedPattern(_))
        ));
        assert!(matches!(
            router.subscribe("ghost", "*"),
            Err(RouterError::UnknownSubscriber(_))
        ));
        assert!(router.subscriptions_of("plot").is_empty());
    }

    #[tokio::test]
    async fn test_consumer_stream() {
        let router = lab();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let plot = router.register_consumer("plot").unwrap();
        router.connect_as_provider("ctd", "plot").unwrap();

        for n in 0..5 {
            ctd.submit(json!({"n": n})).await.unwrap();
        }

        let numbers: Vec<u64> = tokio::time::timeout(
            WAIT,
            plot.into_stream().take(5).map(|p| p.packet_number()).collect(),
        )
        .await
        .unwrap();
        assert_eq!(numbers, [0, 1, 2, 3, 4]);
    }
}
