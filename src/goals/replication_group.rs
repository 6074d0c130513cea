use std::cmp::Reverse;
use std::collections::BTreeSet;

use tracing::debug;

use super::{BalancingPhase, Goal};
use crate::actions::Action;
use crate::models::{BrokerId, ClusterTopology, PartitionKey, ReplicationGroupId};
use crate::stats;
use crate::RebalancerError;

/// Spreads every partition's replicas evenly over replication groups, then
/// evens out the total replica count each group hosts.
pub struct ReplicationGroupGoal;

impl Goal for ReplicationGroupGoal {
    fn name(&self) -> &str {
        "ReplicationGroupGoal"
    }

    fn phase(&self) -> BalancingPhase {
        BalancingPhase::ReplicationGroup
    }

    fn score(&self, topology: &ClusterTopology) -> usize {
        stats::replica_cnt(topology) + stats::net_part_cnt_per_rg(topology)
    }

    fn rebalance(&self, topology: &mut ClusterTopology) -> Result<Vec<Action>, RebalancerError> {
        let mut actions = Vec::new();
        // Group-total moves can unblock spreading moves and vice versa.
        loop {
            let taken = actions.len();
            self.evacuate_stranded_replicas(topology, &mut actions)?;
            self.balance_replicas(topology, &mut actions)?;
            self.balance_group_partition_counts(topology, &mut actions)?;
            if actions.len() == taken {
                return Ok(actions);
            }
        }
    }
}

impl ReplicationGroupGoal {
    /// Replicas on dead brokers whose group has no live broker left to take
    /// them over move to the least loaded group that can, even when the
    /// spread stays flat.
    fn evacuate_stranded_replicas(
        &self,
        topology: &mut ClusterTopology,
        actions: &mut Vec<Action>,
    ) -> Result<(), RebalancerError> {
        loop {
            let view: &ClusterTopology = topology;
            let mut stranded = Vec::new();
            for broker in view.dead_brokers() {
                for key in broker.partitions() {
                    if !view.group_can_accept(&broker.replication_group, key) {
                        stranded.push((key, broker.id, broker.replication_group.as_str()));
                    }
                }
            }

            let next_move = stranded.iter().find_map(|(key, from, source)| {
                let mut destinations: Vec<(&str, usize, usize)> = view
                    .replication_groups()
                    .filter(|g| g.id != *source && view.group_can_accept(&g.id, key))
                    .map(|g| {
                        (
                            g.id.as_str(),
                            view.group_replica_count(&g.id, key),
                            view.group_partition_count(&g.id),
                        )
                    })
                    .collect();
                destinations.sort_by_key(|&(id, in_group, total)| (in_group, total, id));

                let destination = destinations
                    .iter()
                    .map(|&(destination, _, _)| destination)
                    .find(|destination| move_keeps_score(view, key, source, destination))?;
                let to = select_destination_broker(view, destination, key)?;
                Some(Action::move_replica(key, *from, to))
            });

            match next_move {
                Some(action) => {
                    debug!(action = %action.description(), "Evacuating stranded replica");
                    action.apply(topology)?;
                    actions.push(action);
                }
                None => return Ok(()),
            }
        }
    }

    /// Per partition: move replicas between groups while a single move
    /// lowers the spread without raising the stage score.
    fn balance_replicas(
        &self,
        topology: &mut ClusterTopology,
        actions: &mut Vec<Action>,
    ) -> Result<(), RebalancerError> {
        let keys: Vec<PartitionKey> = topology.partitions().map(|p| p.key.clone()).collect();

        for key in &keys {
            while let Some((source, destination)) = spreading_move(topology, key) {
                let action = match self.replica_move(topology, key, &source, &destination) {
                    Some(action) => action,
                    None => break,
                };
                debug!(
                    partition = %key,
                    from_group = %source,
                    to_group = %destination,
                    "Spreading replica over replication groups"
                );
                action.apply(topology)?;
                actions.push(action);
            }
        }
        Ok(())
    }

    /// Move replicas from groups hosting too many replicas overall to groups
    /// hosting too few, only picking partitions whose per-group spread does
    /// not get worse.
    fn balance_group_partition_counts(
        &self,
        topology: &mut ClusterTopology,
        actions: &mut Vec<Action>,
    ) -> Result<(), RebalancerError> {
        loop {
            let totals: Vec<(ReplicationGroupId, usize)> = topology
                .replication_groups()
                .map(|g| (g.id.clone(), topology.group_partition_count(&g.id)))
                .collect();

            let mut over = totals.clone();
            over.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let mut under = totals;
            under.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

            let mut next_move = None;
            'search: for (source, source_total) in &over {
                for (destination, destination_total) in &under {
                    if *source_total < destination_total + 2 {
                        break;
                    }
                    if let Some(key) = self.select_victim(topology, source, destination) {
                        if let Some(action) =
                            self.replica_move(topology, &key, source, destination)
                        {
                            next_move = Some(action);
                            break 'search;
                        }
                    }
                }
            }

            match next_move {
                Some(action) => {
                    debug!(action = %action.description(), "Evening out group partition count");
                    action.apply(topology)?;
                    actions.push(action);
                }
                None => return Ok(()),
            }
        }
    }

    /// Partition of `source` with more replicas there than in `destination`,
    /// preferring the largest difference and then the lowest key.
    fn select_victim(
        &self,
        topology: &ClusterTopology,
        source: &str,
        destination: &str,
    ) -> Option<PartitionKey> {
        let candidates: BTreeSet<&PartitionKey> = topology
            .group_brokers(source)
            .flat_map(|b| b.partitions())
            .collect();

        let mut best: Option<(usize, &PartitionKey)> = None;
        for key in candidates {
            let in_source = topology.group_replica_count(source, key);
            let in_destination = topology.group_replica_count(destination, key);
            if in_source <= in_destination || !topology.group_can_accept(destination, key) {
                continue;
            }
            let gain = in_source - in_destination;
            if best.map_or(true, |(best_gain, _)| gain > best_gain) {
                best = Some((gain, key));
            }
        }
        best.map(|(_, key)| key.clone())
    }

    fn replica_move(
        &self,
        topology: &ClusterTopology,
        key: &PartitionKey,
        source_group: &str,
        destination_group: &str,
    ) -> Option<Action> {
        let from = select_source_broker(topology, source_group, key)?;
        let to = select_destination_broker(topology, destination_group, key)?;
        Some(Action::move_replica(key, from, to))
    }
}

fn group_replica_counts(
    topology: &ClusterTopology,
    key: &PartitionKey,
) -> Vec<(ReplicationGroupId, usize)> {
    topology
        .replication_groups()
        .map(|g| (g.id.clone(), topology.group_replica_count(&g.id, key)))
        .collect()
}

/// Group pair whose single move lowers the spread of `key` without raising
/// the stage score. Fullest source and emptiest destination are tried first,
/// ties going to the lowest group id.
fn spreading_move(
    topology: &ClusterTopology,
    key: &PartitionKey,
) -> Option<(ReplicationGroupId, ReplicationGroupId)> {
    let counts = group_replica_counts(topology, key);
    let spread: Vec<usize> = counts.iter().map(|(_, count)| *count).collect();
    let current = stats::net_imbalance(&spread);
    if current == 0 {
        return None;
    }

    let mut sources: Vec<&(ReplicationGroupId, usize)> =
        counts.iter().filter(|(_, count)| *count > 0).collect();
    sources.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let mut destinations: Vec<&(ReplicationGroupId, usize)> = counts
        .iter()
        .filter(|(group, _)| topology.group_can_accept(group, key))
        .collect();
    destinations.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    for (source, _) in &sources {
        for (destination, _) in &destinations {
            if source == destination {
                continue;
            }
            let shifted: Vec<usize> = counts
                .iter()
                .map(|(group, count)| {
                    if group == source {
                        count - 1
                    } else if group == destination {
                        count + 1
                    } else {
                        *count
                    }
                })
                .collect();
            if stats::net_imbalance(&shifted) < current
                && move_keeps_score(topology, key, source, destination)
            {
                return Some((source.clone(), destination.clone()));
            }
        }
    }
    None
}

/// Whether moving one replica of `key` from `source` to `destination` leaves
/// the combined spread and group-total imbalance no higher than before.
fn move_keeps_score(
    topology: &ClusterTopology,
    key: &PartitionKey,
    source: &str,
    destination: &str,
) -> bool {
    let mut spread = Vec::new();
    let mut totals = Vec::new();
    let mut shifted_spread = Vec::new();
    let mut shifted_totals = Vec::new();
    for group in topology.replication_groups() {
        let in_group = topology.group_replica_count(&group.id, key);
        let total = topology.group_partition_count(&group.id);
        let delta = |count: usize| {
            if group.id == source {
                count.saturating_sub(1)
            } else if group.id == destination {
                count + 1
            } else {
                count
            }
        };
        spread.push(in_group);
        totals.push(total);
        shifted_spread.push(delta(in_group));
        shifted_totals.push(delta(total));
    }
    let before = stats::net_imbalance(&spread) + stats::net_imbalance(&totals);
    let after = stats::net_imbalance(&shifted_spread) + stats::net_imbalance(&shifted_totals);
    after <= before
}

/// Replica holder in `group` to give up `key`: dead brokers first, then the
/// broker with most replicas of the topic, then most partitions overall.
fn select_source_broker(
    topology: &ClusterTopology,
    group: &str,
    key: &PartitionKey,
) -> Option<BrokerId> {
    topology
        .group_brokers(group)
        .filter(|b| b.has_partition(key))
        .min_by_key(|b| {
            (
                b.is_alive,
                Reverse(topology.topic_partition_count(b.id, &key.topic)),
                Reverse(b.partition_count()),
                b.id,
            )
        })
        .map(|b| b.id)
}

/// Live broker in `group` whose load after taking `key` is smallest.
fn select_destination_broker(
    topology: &ClusterTopology,
    group: &str,
    key: &PartitionKey,
) -> Option<BrokerId> {
    topology
        .group_brokers(group)
        .filter(|b| b.can_accept(key))
        .min_by_key(|b| {
            (
                topology.topic_partition_count(b.id, &key.topic),
                b.partition_count(),
                b.id,
            )
        })
        .map(|b| b.id)
}
