//! Count-based imbalance metrics.
//!
//! Every metric measures how far a set of bucket counts is from an even
//! split: with `total` items over `n` buckets each bucket should hold
//! `total / n`, and exactly `total % n` buckets may hold one more. A bucket's
//! excess over that allowance is its imbalance; a metric is the sum of
//! excesses, so 0 means perfectly balanced. All functions here are pure.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Assignment, ClusterTopology, PartitionKey, TopicName};

/// Even share of `total` items over `buckets`: `(optimum, buckets allowed one extra)`.
pub fn compute_optimum(buckets: usize, total: usize) -> (usize, usize) {
    if buckets == 0 {
        return (0, 0);
    }
    (total / buckets, total % buckets)
}

/// Imbalance of `counts` when the items they hold are all there is.
pub fn net_imbalance(counts: &[usize]) -> usize {
    imbalance_against(counts, counts.iter().sum())
}

/// Imbalance of live `counts` when `evacuating` further items sit in buckets
/// that must be emptied (dead brokers). The fair share is taken over the
/// live buckets for the full total and every evacuating item counts as
/// excess.
pub fn imbalance_with_evacuation(counts: &[usize], evacuating: usize) -> usize {
    let total = counts.iter().sum::<usize>() + evacuating;
    imbalance_against(counts, total) + evacuating
}

fn imbalance_against(counts: &[usize], total: usize) -> usize {
    let (optimum, mut extra_allowed) = compute_optimum(counts.len(), total);
    counts
        .iter()
        .map(|&count| {
            if count <= optimum {
                0
            } else if extra_allowed > 0 {
                extra_allowed -= 1;
                count - optimum - 1
            } else {
                count - optimum
            }
        })
        .sum()
}

/// Replica count of `key` per replication group, in group id order.
pub fn partition_group_counts(topology: &ClusterTopology, key: &PartitionKey) -> Vec<usize> {
    topology
        .replication_groups()
        .map(|group| topology.group_replica_count(&group.id, key))
        .collect()
}

/// Per topic: summed imbalance of each partition's replicas across groups.
pub fn replica_cnt_per_topic(topology: &ClusterTopology) -> BTreeMap<TopicName, usize> {
    topology
        .topics()
        .map(|topic| {
            let imbalance = topic
                .partition_keys()
                .map(|key| net_imbalance(&partition_group_counts(topology, &key)))
                .sum();
            (topic.name.clone(), imbalance)
        })
        .collect()
}

pub fn replica_cnt(topology: &ClusterTopology) -> usize {
    replica_cnt_per_topic(topology).values().sum()
}

/// Imbalance of total hosted replicas across replication groups.
pub fn net_part_cnt_per_rg(topology: &ClusterTopology) -> usize {
    let counts: Vec<usize> = topology
        .replication_groups()
        .map(|group| topology.group_partition_count(&group.id))
        .collect();
    net_imbalance(&counts)
}

/// Partition-count imbalance across the brokers of one group.
pub fn group_partition_cnt(topology: &ClusterTopology, group: &str) -> usize {
    let mut live = Vec::new();
    let mut evacuating = 0;
    for broker in topology.group_brokers(group) {
        if broker.is_alive {
            live.push(broker.partition_count());
        } else {
            evacuating += broker.partition_count();
        }
    }
    imbalance_with_evacuation(&live, evacuating)
}

/// Partition-count imbalance across brokers, summed over replication groups.
pub fn partition_cnt(topology: &ClusterTopology) -> usize {
    topology
        .replication_groups()
        .map(|group| group_partition_cnt(topology, &group.id))
        .sum()
}

/// Per-topic replica-count imbalance across all brokers, summed over topics.
pub fn topic_partition_cnt(topology: &ClusterTopology) -> usize {
    topology
        .topics()
        .map(|topic| {
            let mut live = Vec::new();
            let mut evacuating = 0;
            for broker in topology.brokers() {
                let count = topology.topic_partition_count(broker.id, &topic.name);
                if broker.is_alive {
                    live.push(count);
                } else {
                    evacuating += count;
                }
            }
            imbalance_with_evacuation(&live, evacuating)
        })
        .sum()
}

/// Leader-count imbalance across brokers.
pub fn leader_cnt(topology: &ClusterTopology) -> usize {
    let counts = topology.leader_counts();
    let mut live = Vec::new();
    let mut evacuating = 0;
    for broker in topology.brokers() {
        let count = counts.get(&broker.id).copied().unwrap_or(0);
        if broker.is_alive {
            live.push(count);
        } else {
            evacuating += count;
        }
    }
    imbalance_with_evacuation(&live, evacuating)
}

/// Replicas in `current` whose broker is not in the baseline replica set of
/// the same partition.
pub fn total_movements(current: &Assignment, baseline: &Assignment) -> usize {
    current
        .iter()
        .map(|(key, replicas)| {
            let base = baseline.get(key).unwrap_or(&[]);
            replicas.iter().filter(|b| !base.contains(b)).count()
        })
        .sum()
}

/// All imbalance metrics of one topology snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImbalanceStats {
    pub replica_cnt: usize,
    pub net_part_cnt_per_rg: usize,
    pub partition_cnt: usize,
    pub topic_partition_cnt: usize,
    pub leader_cnt: usize,
    pub total_movements: usize,
}

impl ImbalanceStats {
    /// Metrics of `topology`, with movements counted against its initial
    /// assignment.
    pub fn compute(topology: &ClusterTopology) -> Self {
        Self::compute_against(topology, topology.initial_assignment())
    }

    pub fn compute_against(topology: &ClusterTopology, baseline: &Assignment) -> Self {
        Self {
            replica_cnt: replica_cnt(topology),
            net_part_cnt_per_rg: net_part_cnt_per_rg(topology),
            partition_cnt: partition_cnt(topology),
            topic_partition_cnt: topic_partition_cnt(topology),
            leader_cnt: leader_cnt(topology),
            total_movements: total_movements(&topology.assignment(), baseline),
        }
    }

    pub fn replication_group_score(&self) -> usize {
        self.replica_cnt + self.net_part_cnt_per_rg
    }

    pub fn broker_score(&self) -> usize {
        self.partition_cnt + self.topic_partition_cnt
    }

    pub fn leader_score(&self) -> usize {
        self.leader_cnt
    }

    /// Net cluster imbalance excluding leaders.
    pub fn net_imbalance(&self) -> usize {
        self.replica_cnt + self.net_part_cnt_per_rg + self.partition_cnt + self.topic_partition_cnt
    }

    pub fn total_imbalance(&self) -> usize {
        self.net_imbalance() + self.leader_cnt
    }

    pub fn is_balanced(&self) -> bool {
        self.total_imbalance() == 0
    }
}

impl fmt::Display for ImbalanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "replica-count/rg: {}, partition-count/rg: {}, partition-count/broker: {}, \
             topic-partition-count: {}, leader-count: {}, net: {}, movements: {}",
            self.replica_cnt,
            self.net_part_cnt_per_rg,
            self.partition_cnt,
            self.topic_partition_cnt,
            self.leader_cnt,
            self.total_imbalance(),
            self.total_movements
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClusterMetadata;

    #[test]
    fn test_compute_optimum() {
        assert_eq!(compute_optimum(3, 10), (3, 1));
        assert_eq!(compute_optimum(4, 4), (1, 0));
        assert_eq!(compute_optimum(0, 4), (0, 0));
    }

    #[test]
    fn test_net_imbalance() {
        assert_eq!(net_imbalance(&[]), 0);
        assert_eq!(net_imbalance(&[3, 3]), 0);
        assert_eq!(net_imbalance(&[2, 0, 2]), 1);
        assert_eq!(net_imbalance(&[4, 2, 0]), 2);
        assert_eq!(net_imbalance(&[2, 2, 1, 1]), 0);
        assert_eq!(net_imbalance(&[6, 0]), 3);
    }

    #[test]
    fn test_imbalance_with_evacuation() {
        assert_eq!(imbalance_with_evacuation(&[1, 1], 2), 2);
        assert_eq!(imbalance_with_evacuation(&[3, 1], 0), 1);
        assert_eq!(imbalance_with_evacuation(&[], 3), 3);
        assert_eq!(imbalance_with_evacuation(&[2, 2], 0), 0);
    }

    #[test]
    fn test_metrics_on_skewed_cluster() {
        // Two groups, everything on group a; broker 1 leads everything.
        let metadata = ClusterMetadata::builder()
            .broker(1, "a")
            .broker(2, "a")
            .broker(3, "b")
            .broker(4, "b")
            .partition("t", 0, [1, 2])
            .partition("t", 1, [1, 2])
            .build();
        let topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let stats = ImbalanceStats::compute(&topology);

        // Each partition: [2, 0] over two groups -> 1 excess.
        assert_eq!(stats.replica_cnt, 2);
        // Groups hold [4, 0].
        assert_eq!(stats.net_part_cnt_per_rg, 2);
        // Group a brokers hold [2, 2], group b [0, 0].
        assert_eq!(stats.partition_cnt, 0);
        // Topic t over four brokers: [2, 2, 0, 0].
        assert_eq!(stats.topic_partition_cnt, 2);
        // Leaders [2, 0, 0, 0].
        assert_eq!(stats.leader_cnt, 1);
        assert_eq!(stats.total_movements, 0);
        assert_eq!(stats.replication_group_score(), 4);
        assert!(!stats.is_balanced());
    }

    #[test]
    fn test_dead_broker_holdings_count_as_imbalance() {
        let metadata = ClusterMetadata::builder()
            .broker(1, "a")
            .dead_broker(2, "a")
            .partition("t", 0, [2])
            .build();
        let topology = ClusterTopology::from_metadata(&metadata).unwrap();
        assert_eq!(partition_cnt(&topology), 1);
        assert_eq!(leader_cnt(&topology), 1);
        assert_eq!(topic_partition_cnt(&topology), 1);
    }

    #[test]
    fn test_total_movements() {
        let base: Assignment = [(PartitionKey::new("t", 0), vec![1, 2])].into_iter().collect();
        let swapped: Assignment = [(PartitionKey::new("t", 0), vec![2, 1])].into_iter().collect();
        let moved: Assignment = [(PartitionKey::new("t", 0), vec![3, 4])].into_iter().collect();
        assert_eq!(total_movements(&swapped, &base), 0);
        assert_eq!(total_movements(&moved, &base), 2);
    }
}
