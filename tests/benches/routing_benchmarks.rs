//! # Routing Benchmarks
//!
//! Hot-path costs of the distributor, measured without the async loop:
//!
//! | Stage | Operation |
//! |-------|-----------|
//! | Key paths | `extract_key_paths` over nested payloads |
//! | Matching | `AddressPattern::matches_tree` / `select` |
//! | Routing | `SubscriptionRegistry::route_targets_with` with many subscribers |
//! | Enrichment | `PacketEnricher::enrich` for fresh and relayed input |

use std::sync::Arc;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use packet_router::{extract_key_paths, AddressPattern, PacketEnricher, SubscriptionRegistry};
use rand::Rng;
use serde_json::{json, Value};
use shared_types::{EnrichedPacket, HostIdentity};

fn host() -> Arc<HostIdentity> {
    Arc::new(HostIdentity::with_uuid("bench", "bench-uuid", Utc::now()))
}

/// A CTD-like payload with `channels` sensor groups of three readings and a
/// short profile sequence each.
fn payload(channels: usize) -> Value {
    let mut rng = rand::thread_rng();
    let mut map = serde_json::Map::new();
    for c in 0..channels {
        let profile: Vec<f64> = (0..8).map(|_| rng.gen_range(0.0..30.0)).collect();
        map.insert(
            format!("ch{c}"),
            json!({
                "temp": rng.gen_range(-2.0..30.0),
                "cond": rng.gen_range(0.0..6.0),
                "pres": rng.gen_range(0.0..6000.0),
                "profile": profile,
            }),
        );
    }
    Value::Object(map)
}

fn packet(channels: usize) -> EnrichedPacket {
    PacketEnricher::new()
        .enrich(payload(channels), "ctd", "seabird", &host(), Utc::now())
        .unwrap()
}

// ============================================================================
// KEY PATHS
// ============================================================================

fn bench_key_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("key-paths");

    for channels in [1, 8, 64] {
        let p = packet(channels);
        group.throughput(Throughput::Elements(channels as u64));
        group.bench_with_input(BenchmarkId::new("compact", channels), &p, |b, p| {
            b.iter(|| black_box(extract_key_paths(&p.payload, false)))
        });
        group.bench_with_input(BenchmarkId::new("expanded", channels), &p, |b, p| {
            b.iter(|| black_box(extract_key_paths(&p.payload, true)))
        });
    }

    group.finish();
}

// ============================================================================
// MATCHING
// ============================================================================

fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    let p = packet(16);
    let tree = extract_key_paths(&p.payload, true).tree;

    for raw in ["*", "ch7/temp", "*/profile/3", "ch15@ctd@bench", "missing/key"] {
        let pattern = AddressPattern::parse(raw).unwrap();
        group.bench_with_input(BenchmarkId::new("matches_tree", raw), &pattern, |b, pat| {
            b.iter(|| black_box(pat.matches_tree(&tree)))
        });
        group.bench_with_input(BenchmarkId::new("select", raw), &pattern, |b, pat| {
            b.iter(|| black_box(pat.select(&p)))
        });
    }

    group.bench_function("parse", |b| {
        b.iter(|| black_box(AddressPattern::parse("ch3/*/profile@ctd@bench")))
    });

    group.finish();
}

// ============================================================================
// ROUTING
// ============================================================================

fn bench_route_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("route-targets");
    let p = packet(16);
    let tree = extract_key_paths(&p.payload, true).tree;

    for subscribers in [10, 100, 1000] {
        let mut registry = SubscriptionRegistry::new();
        registry.register_producer("ctd", "seabird").unwrap();
        for i in 0..subscribers {
            let id = format!("sink{i}");
            registry.register_consumer(&id).unwrap();
            let pattern = match i % 4 {
                0 => format!("ch{}/temp", i % 32),
                1 => "*/cond".to_string(),
                2 => "@gps".to_string(),
                _ => format!("ch{}@ctd", i % 16),
            };
            registry
                .subscribe(&id, AddressPattern::parse(&pattern).unwrap())
                .unwrap();
        }

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &registry,
            |b, registry| b.iter(|| black_box(registry.route_targets_with(&p, &tree))),
        );
    }

    group.finish();
}

// ============================================================================
// ENRICHMENT
// ============================================================================

fn bench_enrich(c: &mut Criterion) {
    let mut group = c.benchmark_group("enrich");
    let host = host();
    let fresh = payload(8);
    let relayed = packet(8).into_wire().unwrap();

    group.bench_function("fresh", |b| {
        let mut enricher = PacketEnricher::new();
        b.iter(|| {
            black_box(
                enricher
                    .enrich(fresh.clone(), "ctd", "seabird", &host, Utc::now())
                    .unwrap(),
            )
        })
    });

    group.bench_function("relayed", |b| {
        let mut enricher = PacketEnricher::new();
        b.iter(|| {
            black_box(
                enricher
                    .enrich(relayed.clone(), "from_lab", "relay", &host, Utc::now())
                    .unwrap(),
            )
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_key_paths,
    bench_matching,
    bench_route_targets,
    bench_enrich
);
criterion_main!(benches);
