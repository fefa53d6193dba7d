//! # Backpressure Flows
//!
//! Slow consumers and full queues. Covers:
//!
//! 1. Bounded wait then drop for a full subscriber queue, others unaffected
//! 2. Producers never seeing consumer-side drops
//! 3. Queue-full on ingress as a recoverable error
//! 4. Consumers that disappear mid-stream

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use packet_router::{Distributor, PacketIngress, RouterConfig, RouterError};
    use serde_json::json;

    use crate::integration::{eventually, host, WAIT};

    fn tight() -> RouterConfig {
        RouterConfig::default()
            .with_consumer_capacity(2)
            .with_delivery_timeout(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_slow_consumer_drops_without_stalling_others() {
        let (router, _task) = Distributor::spawn(host("lab"), tight()).unwrap();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let mut slow = router.register_consumer("slow").unwrap();
        let mut fast = router.register_consumer("fast").unwrap();
        router.connect_as_provider("ctd", "slow").unwrap();
        router.connect_as_provider("ctd", "fast").unwrap();

        for n in 0..10u64 {
            ctd.submit(json!({"n": n})).await.unwrap();
            let packet = fast.poll(WAIT).await.unwrap();
            assert_eq!(packet.packet_number(), n);
        }

        assert!(eventually(|| router.dropped_total() == 8).await);
        let summary = router.summary();
        assert_eq!(summary.dropped.get("slow"), Some(&8));
        assert_eq!(router.metrics().packets_dropped, 8);
        assert_eq!(ctd.rejected(), 0);

        // The slow consumer kept the oldest packets, in order.
        let kept: Vec<u64> = slow.drain().iter().map(|p| p.packet_number()).collect();
        assert_eq!(kept, [0, 1]);

        // Once drained it receives again.
        ctd.submit(json!({"n": 10})).await.unwrap();
        assert_eq!(slow.poll(WAIT).await.unwrap().packet_number(), 10);
    }

    #[tokio::test]
    async fn test_ingress_queue_full_is_recoverable() {
        let config = RouterConfig::default().with_ingress_capacity(2);
        // The distributor is never run, so nothing drains the ingress queue.
        let (_distributor, router) = Distributor::new(host("lab"), config).unwrap();
        let ctd = router.register_producer("ctd", "seabird").unwrap();

        ctd.try_submit(json!({"n": 0})).unwrap();
        ctd.try_submit(json!({"n": 1})).unwrap();

        let ingress: &dyn PacketIngress = &router;
        let err = ingress.try_submit("ctd", json!({"n": 2})).unwrap_err();
        assert_eq!(err, RouterError::QueueFull("ctd".into()));
        assert!(err.is_recoverable());

        let err = ingress.submit("ctd", json!({"n": 3})).await.unwrap_err();
        assert!(err.is_recoverable());

        assert!(matches!(
            ingress.try_submit("ghost", json!({})),
            Err(RouterError::UnknownProducer(_))
        ));
    }

    #[tokio::test]
    async fn test_consumer_leaving_mid_stream() {
        let (router, _task) = Distributor::spawn(host("lab"), tight()).unwrap();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let leaver = router.register_consumer("leaver").unwrap();
        let mut stayer = router.register_consumer("stayer").unwrap();
        router.subscribe("leaver", "*").unwrap();
        router.subscribe("stayer", "*").unwrap();

        ctd.submit(json!({"n": 0})).await.unwrap();
        stayer.poll(WAIT).await.unwrap();
        drop(leaver);

        for n in 1..5 {
            ctd.submit(json!({"n": n})).await.unwrap();
            stayer.poll(WAIT).await.unwrap();
        }

        assert!(eventually(|| router.device("leaver").is_none()).await);
        assert_eq!(router.dropped_total(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_both_sides() {
        let (router, task) = Distributor::spawn(host("lab"), RouterConfig::default()).unwrap();
        let ctd = router.register_producer("ctd", "seabird").unwrap();
        let mut plot = router.register_consumer("plot").unwrap();
        router.connect_as_provider("ctd", "plot").unwrap();

        ctd.submit(json!({"n": 0})).await.unwrap();
        plot.poll(WAIT).await.unwrap();

        router.shutdown();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();

        assert!(plot.poll(WAIT).await.is_none());
        assert!(ctd.submit(json!({"n": 1})).await.is_err());
        assert!(matches!(
            router.register_consumer("late"),
            Err(RouterError::ShutDown)
        ));
    }
}
