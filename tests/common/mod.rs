#![allow(dead_code)]

use kafka_cluster_balancer::models::BrokerId;
use kafka_cluster_balancer::ClusterMetadata;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kafka_cluster_balancer=debug")
        .with_test_writer()
        .try_init();
}

/// Three groups of two brokers; topic `t` has six partitions with RF 2, all
/// placed on the two group `a` brokers.
pub fn crowded_cluster() -> ClusterMetadata {
    let mut builder = ClusterMetadata::builder()
        .broker(0, "a")
        .broker(1, "a")
        .broker(2, "b")
        .broker(3, "b")
        .broker(4, "c")
        .broker(5, "c");
    for p in 0..6 {
        builder = builder.partition("t", p, [0, 1]);
    }
    builder.build()
}

/// Random but reproducible cluster. Some brokers may be dead, and placement
/// is skewed towards a subset of brokers so that every phase has work to do.
pub fn random_cluster(seed: u64) -> ClusterMetadata {
    let mut rng = StdRng::seed_from_u64(seed);

    let group_count = rng.random_range(1..=4);
    let mut builder = ClusterMetadata::builder();
    let mut broker_ids: Vec<BrokerId> = Vec::new();
    let mut next_id: BrokerId = 0;
    for g in 0..group_count {
        let group = format!("rg-{}", g);
        for _ in 0..rng.random_range(1..=3) {
            builder = if rng.random_bool(0.15) {
                builder.dead_broker(next_id, group.clone())
            } else {
                builder.broker(next_id, group.clone())
            };
            broker_ids.push(next_id);
            next_id += 1;
        }
    }

    let hot_len = (broker_ids.len() / 2).max(1);
    for t in 0..rng.random_range(1..=3) {
        let topic = format!("topic-{}", t);
        let replication_factor = rng.random_range(1..=broker_ids.len().min(3));
        for p in 0..rng.random_range(1..=8) {
            let pool = if rng.random_bool(0.6) && hot_len >= replication_factor {
                &broker_ids[..hot_len]
            } else {
                &broker_ids[..]
            };
            let mut candidates = pool.to_vec();
            candidates.shuffle(&mut rng);
            candidates.truncate(replication_factor);
            builder = builder.partition(&topic, p, candidates);
        }
    }
    builder.build()
}
