use tracing::debug;

use super::{BalancingPhase, Goal};
use crate::actions::Action;
use crate::models::{BrokerId, ClusterTopology, PartitionKey, ReplicationGroupId};
use crate::stats;
use crate::RebalancerError;

/// Evens out partition counts across the brokers of each replication group,
/// keeping per-topic counts as even as the moves allow. Replicas never leave
/// their group.
pub struct BrokerDistributionGoal;

#[derive(Debug, Clone, Copy)]
struct BrokerLoad {
    id: BrokerId,
    is_alive: bool,
    partitions: usize,
}

impl Goal for BrokerDistributionGoal {
    fn name(&self) -> &str {
        "BrokerDistributionGoal"
    }

    fn phase(&self) -> BalancingPhase {
        BalancingPhase::Broker
    }

    fn score(&self, topology: &ClusterTopology) -> usize {
        stats::partition_cnt(topology) + stats::topic_partition_cnt(topology)
    }

    fn rebalance(&self, topology: &mut ClusterTopology) -> Result<Vec<Action>, RebalancerError> {
        let groups: Vec<ReplicationGroupId> =
            topology.replication_groups().map(|g| g.id.clone()).collect();

        let mut actions = Vec::new();
        for group in &groups {
            self.balance_group(topology, group, &mut actions)?;
        }
        Ok(actions)
    }
}

impl BrokerDistributionGoal {
    fn balance_group(
        &self,
        topology: &mut ClusterTopology,
        group: &str,
        actions: &mut Vec<Action>,
    ) -> Result<(), RebalancerError> {
        loop {
            let loads: Vec<BrokerLoad> = topology
                .group_brokers(group)
                .map(|b| BrokerLoad {
                    id: b.id,
                    is_alive: b.is_alive,
                    partitions: b.partition_count(),
                })
                .collect();
            let pairs = improving_pairs(&loads);

            let next = pairs
                .iter()
                .find_map(|&(from, to)| {
                    select_victim(topology, from, to, true).map(|key| (from, to, key))
                })
                .or_else(|| {
                    pairs.iter().find_map(|&(from, to)| {
                        select_victim(topology, from, to, false).map(|key| (from, to, key))
                    })
                });

            let Some((from, to, key)) = next else {
                return Ok(());
            };
            let action = Action::move_replica(&key, from, to);
            debug!(group, action = %action.description(), "Evening out broker partition count");
            action.apply(topology)?;
            actions.push(action);
        }
    }
}

/// (source, destination) pairs whose single move lowers the group's
/// partition-count imbalance, most loaded source and least loaded
/// destination first.
fn improving_pairs(loads: &[BrokerLoad]) -> Vec<(BrokerId, BrokerId)> {
    let current = group_imbalance(loads);
    if current == 0 {
        return Vec::new();
    }

    let mut sources: Vec<&BrokerLoad> = loads.iter().filter(|l| l.partitions > 0).collect();
    sources.sort_by_key(|l| (l.is_alive, std::cmp::Reverse(l.partitions), l.id));
    let mut destinations: Vec<&BrokerLoad> = loads.iter().filter(|l| l.is_alive).collect();
    destinations.sort_by_key(|l| (l.partitions, l.id));

    let mut pairs = Vec::new();
    for source in &sources {
        for destination in &destinations {
            if source.id == destination.id {
                continue;
            }
            let simulated: Vec<BrokerLoad> = loads
                .iter()
                .map(|l| {
                    let mut l = *l;
                    if l.id == source.id {
                        l.partitions -= 1;
                    } else if l.id == destination.id {
                        l.partitions += 1;
                    }
                    l
                })
                .collect();
            if group_imbalance(&simulated) < current {
                pairs.push((source.id, destination.id));
            }
        }
    }
    pairs
}

fn group_imbalance(loads: &[BrokerLoad]) -> usize {
    let live: Vec<usize> = loads
        .iter()
        .filter(|l| l.is_alive)
        .map(|l| l.partitions)
        .collect();
    let evacuating = loads
        .iter()
        .filter(|l| !l.is_alive)
        .map(|l| l.partitions)
        .sum();
    stats::imbalance_with_evacuation(&live, evacuating)
}

/// Partition to move from `from` to `to`. Prefers the topic most
/// over-represented on `from` relative to `to`; with `keep_topic_balance`
/// only moves that cannot raise the topic imbalance qualify.
fn select_victim(
    topology: &ClusterTopology,
    from: BrokerId,
    to: BrokerId,
    keep_topic_balance: bool,
) -> Option<PartitionKey> {
    let source = topology.broker(from)?;
    let destination = topology.broker(to)?;

    let mut best: Option<(isize, &PartitionKey)> = None;
    for key in source.partitions() {
        if !destination.can_accept(key) {
            continue;
        }
        let on_source = topology.topic_partition_count(from, &key.topic) as isize;
        let on_destination = topology.topic_partition_count(to, &key.topic) as isize;
        let gain = on_source - on_destination;
        if keep_topic_balance && source.is_alive && gain <= 0 {
            continue;
        }
        if best.map_or(true, |(best_gain, _)| gain > best_gain) {
            best = Some((gain, key));
        }
    }
    best.map(|(_, key)| key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClusterMetadata;

    #[test]
    fn test_balances_within_group() {
        let metadata = ClusterMetadata::builder()
            .broker(1, "a")
            .broker(2, "a")
            .broker(3, "b")
            .broker(4, "b")
            .partition("t", 0, [1, 3])
            .partition("t", 1, [1, 3])
            .partition("t", 2, [1, 4])
            .partition("t", 3, [1, 4])
            .build();
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        assert_eq!(stats::partition_cnt(&topology), 2);

        let actions = BrokerDistributionGoal.rebalance(&mut topology).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(stats::partition_cnt(&topology), 0);
        assert_eq!(topology.broker(1).unwrap().partition_count(), 2);
        assert_eq!(topology.broker(2).unwrap().partition_count(), 2);
        topology.check_invariants().unwrap();
    }

    #[test]
    fn test_never_crosses_group_boundary() {
        // Group a is overloaded but group b brokers are empty.
        let metadata = ClusterMetadata::builder()
            .broker(1, "a")
            .broker(2, "b")
            .partition("t", 0, [1])
            .partition("t", 1, [1])
            .build();
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let actions = BrokerDistributionGoal.rebalance(&mut topology).unwrap();
        assert!(actions.is_empty());
        assert_eq!(topology.broker(1).unwrap().partition_count(), 2);
    }

    #[test]
    fn test_prefers_topic_neutral_moves() {
        // Broker 1 holds two `t` and one `u`; broker 2 holds one `t`.
        let metadata = ClusterMetadata::builder()
            .broker(1, "a")
            .broker(2, "a")
            .partition("t", 0, [1])
            .partition("t", 1, [1])
            .partition("u", 0, [1])
            .partition("t", 2, [2])
            .partition("v", 0, [2])
            .partition("w", 0, [1])
            .build();
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let before = stats::topic_partition_cnt(&topology);
        BrokerDistributionGoal.rebalance(&mut topology).unwrap();

        assert_eq!(stats::partition_cnt(&topology), 0);
        assert!(stats::topic_partition_cnt(&topology) <= before);
    }

    #[test]
    fn test_drains_dead_broker() {
        let metadata = ClusterMetadata::builder()
            .broker(1, "a")
            .broker(2, "a")
            .dead_broker(3, "a")
            .partition("t", 0, [3])
            .partition("t", 1, [3])
            .build();
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        BrokerDistributionGoal.rebalance(&mut topology).unwrap();

        assert_eq!(topology.broker(3).unwrap().partition_count(), 0);
        assert_eq!(topology.broker(1).unwrap().partition_count(), 1);
        assert_eq!(topology.broker(2).unwrap().partition_count(), 1);
        assert_eq!(stats::partition_cnt(&topology), 0);
    }

    #[test]
    fn test_improving_pairs_empty_when_balanced() {
        let loads = [
            BrokerLoad {
                id: 1,
                is_alive: true,
                partitions: 3,
            },
            BrokerLoad {
                id: 2,
                is_alive: true,
                partitions: 2,
            },
        ];
        assert!(improving_pairs(&loads).is_empty());
    }
}
