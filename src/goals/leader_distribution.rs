use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{BalancingPhase, Goal};
use crate::actions::Action;
use crate::models::{BrokerId, ClusterTopology, PartitionKey};
use crate::stats;
use crate::RebalancerError;

/// Evens out leadership across brokers by reordering replica lists only.
///
/// An over-loaded broker hands one leadership to a follower; when no direct
/// follower can take it without hurting balance, the transfer is chained
/// through followers that pass one of their own leaderships along, so only
/// the two ends of the chain change their count.
pub struct LeaderDistributionGoal;

impl Goal for LeaderDistributionGoal {
    fn name(&self) -> &str {
        "LeaderDistributionGoal"
    }

    fn phase(&self) -> BalancingPhase {
        BalancingPhase::Leader
    }

    fn score(&self, topology: &ClusterTopology) -> usize {
        stats::leader_cnt(topology)
    }

    fn rebalance(&self, topology: &mut ClusterTopology) -> Result<Vec<Action>, RebalancerError> {
        let mut actions = Vec::new();

        loop {
            let counts = topology.leader_counts();
            let current = leader_imbalance(topology, &counts);
            if current == 0 {
                break;
            }

            let mut sources: Vec<BrokerId> = counts
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(id, _)| *id)
                .collect();
            sources.sort_by_key(|id| {
                let alive = topology.broker(*id).map(|b| b.is_alive).unwrap_or(false);
                (alive, Reverse(counts[id]), *id)
            });

            let chain = sources
                .iter()
                .find_map(|source| transfer_chain(topology, &counts, *source, current));
            let Some(chain) = chain else {
                break;
            };

            debug!(hops = chain.len(), "Shifting one leadership");
            for (key, new_leader) in chain {
                let previous_leader = topology.leader_of(&key).ok_or_else(|| {
                    RebalancerError::InvariantViolation(format!("Partition {} has no leader", key))
                })?;
                let action = Action::elect_leader(&key, previous_leader, new_leader);
                action.apply(topology)?;
                actions.push(action);
            }
        }

        Ok(actions)
    }
}

/// Breadth-first search for a sequence of leadership hand-overs starting at
/// `source`. Each hop follows a partition led by the current broker to one of
/// its live followers. The first depth that reaches a broker able to absorb
/// one leadership from `source` wins, picking the broker with fewest
/// leaderships there.
fn transfer_chain(
    topology: &ClusterTopology,
    counts: &BTreeMap<BrokerId, usize>,
    source: BrokerId,
    current: usize,
) -> Option<Vec<(PartitionKey, BrokerId)>> {
    let mut parents: BTreeMap<BrokerId, (BrokerId, PartitionKey)> = BTreeMap::new();
    let mut visited = BTreeSet::from([source]);
    let mut frontier = vec![source];

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &broker_id in &frontier {
            let Some(broker) = topology.broker(broker_id) else {
                continue;
            };
            for key in broker.partitions() {
                let Some(partition) = topology.partition(key) else {
                    continue;
                };
                if partition.leader() != Some(broker_id) {
                    continue;
                }
                for &follower in partition.followers() {
                    let alive = topology.broker(follower).map(|b| b.is_alive).unwrap_or(false);
                    if !alive || !visited.insert(follower) {
                        continue;
                    }
                    parents.insert(follower, (broker_id, key.clone()));
                    next.push(follower);
                }
            }
        }

        let target = next
            .iter()
            .copied()
            .filter(|candidate| {
                let mut shifted = counts.clone();
                if let Some(count) = shifted.get_mut(&source) {
                    *count -= 1;
                }
                *shifted.entry(*candidate).or_insert(0) += 1;
                leader_imbalance(topology, &shifted) < current
            })
            .min_by_key(|candidate| (counts.get(candidate).copied().unwrap_or(0), *candidate));

        if let Some(target) = target {
            let mut chain = Vec::new();
            let mut node = target;
            while node != source {
                let (parent, key) = parents.get(&node)?.clone();
                chain.push((key, node));
                node = parent;
            }
            chain.reverse();
            return Some(chain);
        }
        frontier = next;
    }
    None
}

fn leader_imbalance(topology: &ClusterTopology, counts: &BTreeMap<BrokerId, usize>) -> usize {
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
    stats::imbalance_with_evacuation(&live, evacuating)
}
