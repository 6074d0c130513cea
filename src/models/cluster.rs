use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::{
    Assignment, Broker, BrokerId, BrokerMetadata, ClusterMetadata, Partition, PartitionKey,
    ReplicationGroup, ReplicationGroupId, Topic, TopicName,
};
use crate::RebalancerError;

/// In-memory model of the cluster being rebalanced.
///
/// Brokers, groups, topics and partitions are stored in id-addressed maps;
/// the broker → partition and group → broker indices are derived from the
/// replica lists and kept in step by the mutators. All maps are ordered so
/// that every traversal, and therefore every tie-break, is deterministic.
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    brokers: BTreeMap<BrokerId, Broker>,
    replication_groups: BTreeMap<ReplicationGroupId, ReplicationGroup>,
    topics: BTreeMap<TopicName, Topic>,
    partitions: BTreeMap<PartitionKey, Partition>,
    initial_assignment: Assignment,
}

impl ClusterTopology {
    pub fn from_metadata(metadata: &ClusterMetadata) -> Result<Self, RebalancerError> {
        Self::from_parts(
            &metadata.brokers,
            &metadata.replication_groups,
            &metadata.assignment,
        )
    }

    /// Build the model from the raw (broker-list, replication-group map,
    /// assignment) triple.
    pub fn from_parts(
        brokers: &[BrokerMetadata],
        replication_groups: &BTreeMap<BrokerId, ReplicationGroupId>,
        assignment: &Assignment,
    ) -> Result<Self, RebalancerError> {
        let mut topology = Self {
            brokers: BTreeMap::new(),
            replication_groups: BTreeMap::new(),
            topics: BTreeMap::new(),
            partitions: BTreeMap::new(),
            initial_assignment: assignment.clone(),
        };

        for meta in brokers {
            if topology.brokers.contains_key(&meta.id) {
                return Err(precondition(format!("Broker {} listed twice", meta.id)));
            }
            let group = replication_groups.get(&meta.id).ok_or_else(|| {
                precondition(format!("Broker {} has no replication group", meta.id))
            })?;
            let broker = if meta.is_alive {
                Broker::new(meta.id, group.clone())
            } else {
                Broker::tombstoned(meta.id, group.clone())
            };
            topology.add_broker(broker);
        }

        for (key, replicas) in assignment.iter() {
            if replicas.is_empty() {
                return Err(precondition(format!("Partition {} has no replicas", key)));
            }
            let distinct: BTreeSet<_> = replicas.iter().collect();
            if distinct.len() != replicas.len() {
                return Err(precondition(format!(
                    "Partition {} has duplicate replicas {:?}",
                    key, replicas
                )));
            }

            for &broker_id in replicas {
                if topology.brokers.contains_key(&broker_id) {
                    continue;
                }
                let group = replication_groups.get(&broker_id).ok_or_else(|| {
                    precondition(format!(
                        "Broker {} referenced by partition {} has no replication group",
                        broker_id, key
                    ))
                })?;
                warn!(
                    broker = broker_id,
                    partition = %key,
                    "Broker missing from broker list, treating as dead"
                );
                topology.add_broker(Broker::tombstoned(broker_id, group.clone()));
            }

            let topic = topology
                .topics
                .entry(key.topic.clone())
                .or_insert_with(|| Topic {
                    name: key.topic.clone(),
                    partitions: BTreeSet::new(),
                    replication_factor: replicas.len(),
                });
            if topic.replication_factor != replicas.len() {
                return Err(precondition(format!(
                    "Topic {} has non-uniform replication factor ({} vs {} on partition {})",
                    key.topic,
                    topic.replication_factor,
                    replicas.len(),
                    key.partition
                )));
            }
            topic.partitions.insert(key.partition);

            for broker_id in replicas {
                if let Some(broker) = topology.brokers.get_mut(broker_id) {
                    broker.partitions.insert(key.clone());
                }
            }
            topology.partitions.insert(
                key.clone(),
                Partition {
                    key: key.clone(),
                    replicas: replicas.to_vec(),
                },
            );
        }

        Ok(topology)
    }

    fn add_broker(&mut self, broker: Broker) {
        self.replication_groups
            .entry(broker.replication_group.clone())
            .or_insert_with(|| ReplicationGroup::new(broker.replication_group.clone()))
            .brokers
            .insert(broker.id);
        self.brokers.insert(broker.id, broker);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn broker(&self, id: BrokerId) -> Option<&Broker> {
        self.brokers.get(&id)
    }

    pub fn brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values()
    }

    pub fn alive_brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values().filter(|b| b.is_alive)
    }

    pub fn dead_brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values().filter(|b| !b.is_alive)
    }

    /// Brokers eligible to receive new replicas.
    pub fn live_broker_ids(&self) -> BTreeSet<BrokerId> {
        self.alive_brokers().map(|b| b.id).collect()
    }

    pub fn replication_group(&self, id: &str) -> Option<&ReplicationGroup> {
        self.replication_groups.get(id)
    }

    pub fn replication_groups(&self) -> impl Iterator<Item = &ReplicationGroup> {
        self.replication_groups.values()
    }

    /// Brokers belonging to `group`, in id order.
    pub fn group_brokers<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Broker> + 'a {
        self.replication_groups
            .get(group)
            .into_iter()
            .flat_map(|g| g.brokers.iter())
            .filter_map(|id| self.brokers.get(id))
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    pub fn partition(&self, key: &PartitionKey) -> Option<&Partition> {
        self.partitions.get(key)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Number of partitions `broker` currently leads.
    pub fn leader_count(&self, broker: BrokerId) -> usize {
        self.brokers
            .get(&broker)
            .map(|b| {
                b.partitions
                    .iter()
                    .filter(|key| self.leader_of(key) == Some(broker))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Leader count of every broker, including brokers leading nothing.
    pub fn leader_counts(&self) -> BTreeMap<BrokerId, usize> {
        let mut counts: BTreeMap<BrokerId, usize> =
            self.brokers.keys().map(|id| (*id, 0)).collect();
        for partition in self.partitions.values() {
            if let Some(leader) = partition.leader() {
                *counts.entry(leader).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn leader_of(&self, key: &PartitionKey) -> Option<BrokerId> {
        self.partitions.get(key).and_then(Partition::leader)
    }

    /// Replicas of `topic` hosted by `broker`.
    pub fn topic_partition_count(&self, broker: BrokerId, topic: &str) -> usize {
        self.brokers
            .get(&broker)
            .map(|b| {
                b.partitions
                    .range(PartitionKey::new(topic, 0)..=PartitionKey::new(topic, u32::MAX))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn group_of(&self, broker: BrokerId) -> Option<&str> {
        self.brokers
            .get(&broker)
            .map(|b| b.replication_group.as_str())
    }

    /// Replicas of partition `key` hosted inside `group`.
    pub fn group_replica_count(&self, group: &str, key: &PartitionKey) -> usize {
        self.partitions
            .get(key)
            .map(|p| {
                p.replicas
                    .iter()
                    .filter(|b| self.group_of(**b) == Some(group))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Total replicas hosted by the brokers of `group`.
    pub fn group_partition_count(&self, group: &str) -> usize {
        self.group_brokers(group).map(Broker::partition_count).sum()
    }

    /// Whether some live broker of `group` could take a replica of `key`.
    pub fn group_can_accept(&self, group: &str, key: &PartitionKey) -> bool {
        self.group_brokers(group).any(|b| b.can_accept(key))
    }

    // ------------------------------------------------------------------
    // Mutators. Each validates fully before touching any state.
    // ------------------------------------------------------------------

    /// Relocate the replica of `key` held by `from` onto `to`, keeping its
    /// position in the replica list.
    pub fn move_replica(
        &mut self,
        key: &PartitionKey,
        from: BrokerId,
        to: BrokerId,
    ) -> Result<(), RebalancerError> {
        let partition = self
            .partitions
            .get(key)
            .ok_or_else(|| violation(format!("Unknown partition {}", key)))?;
        let position = partition.position_of(from).ok_or_else(|| {
            violation(format!("Broker {} holds no replica of {}", from, key))
        })?;
        if partition.has_replica(to) {
            return Err(violation(format!(
                "Broker {} already holds a replica of {}",
                to, key
            )));
        }
        match self.brokers.get(&to) {
            None => return Err(violation(format!("Unknown destination broker {}", to))),
            Some(broker) if !broker.is_alive => {
                return Err(violation(format!(
                    "Destination broker {} is not alive",
                    to
                )))
            }
            Some(_) => {}
        }
        if !self.brokers.contains_key(&from) {
            return Err(violation(format!("Unknown source broker {}", from)));
        }

        if let Some(partition) = self.partitions.get_mut(key) {
            partition.replicas[position] = to;
        }
        if let Some(broker) = self.brokers.get_mut(&from) {
            broker.partitions.remove(key);
        }
        if let Some(broker) = self.brokers.get_mut(&to) {
            broker.partitions.insert(key.clone());
        }

        debug!(partition = %key, from, to, position, "Moved replica");
        Ok(())
    }

    /// Swap the positions of two replicas of `key`.
    pub fn swap_replicas(
        &mut self,
        key: &PartitionKey,
        a: BrokerId,
        b: BrokerId,
    ) -> Result<(), RebalancerError> {
        let partition = self
            .partitions
            .get_mut(key)
            .ok_or_else(|| violation(format!("Unknown partition {}", key)))?;
        let pos_a = partition
            .position_of(a)
            .ok_or_else(|| violation(format!("Broker {} holds no replica of {}", a, key)))?;
        let pos_b = partition
            .position_of(b)
            .ok_or_else(|| violation(format!("Broker {} holds no replica of {}", b, key)))?;
        partition.replicas.swap(pos_a, pos_b);
        Ok(())
    }

    /// Make `broker`, already a follower of `key`, its leader.
    pub fn promote_leader(
        &mut self,
        key: &PartitionKey,
        broker: BrokerId,
    ) -> Result<(), RebalancerError> {
        let leader = self
            .leader_of(key)
            .ok_or_else(|| violation(format!("Unknown partition {}", key)))?;
        if leader == broker {
            return Ok(());
        }
        self.swap_replicas(key, leader, broker)?;
        debug!(partition = %key, from = leader, to = broker, "Transferred leadership");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn assignment(&self) -> Assignment {
        self.partitions
            .iter()
            .map(|(key, p)| (key.clone(), p.replicas.clone()))
            .collect()
    }

    /// Assignment the topology was built from.
    pub fn initial_assignment(&self) -> &Assignment {
        &self.initial_assignment
    }

    /// Verify every data-model invariant, including agreement of the derived
    /// indices and that no partition's replication factor drifted from the
    /// initial assignment.
    pub fn check_invariants(&self) -> Result<(), RebalancerError> {
        if self.partitions.len() != self.initial_assignment.len() {
            return Err(violation(format!(
                "Partition count changed from {} to {}",
                self.initial_assignment.len(),
                self.partitions.len()
            )));
        }

        for (key, partition) in &self.partitions {
            let initial = self
                .initial_assignment
                .get(key)
                .ok_or_else(|| violation(format!("Partition {} was not in the initial assignment", key)))?;
            if initial.len() != partition.replicas.len() {
                return Err(violation(format!(
                    "Replication factor of {} changed from {} to {}",
                    key,
                    initial.len(),
                    partition.replicas.len()
                )));
            }

            let topic = self
                .topics
                .get(&key.topic)
                .ok_or_else(|| violation(format!("Partition {} has no topic", key)))?;
            if partition.replicas.len() != topic.replication_factor {
                return Err(violation(format!(
                    "Partition {} has {} replicas, topic requires {}",
                    key,
                    partition.replicas.len(),
                    topic.replication_factor
                )));
            }
            if partition.leader().is_none() {
                return Err(violation(format!("Partition {} has no leader", key)));
            }

            let mut seen = BTreeSet::new();
            for broker_id in &partition.replicas {
                if !seen.insert(*broker_id) {
                    return Err(violation(format!(
                        "Partition {} has broker {} twice",
                        key, broker_id
                    )));
                }
                let broker = self.brokers.get(broker_id).ok_or_else(|| {
                    violation(format!("Partition {} references unknown broker {}", key, broker_id))
                })?;
                if !broker.partitions.contains(key) {
                    return Err(violation(format!(
                        "Broker {} index is missing partition {}",
                        broker_id, key
                    )));
                }
            }
        }

        for broker in self.brokers.values() {
            for key in &broker.partitions {
                let holds = self
                    .partitions
                    .get(key)
                    .map(|p| p.has_replica(broker.id))
                    .unwrap_or(false);
                if !holds {
                    return Err(violation(format!(
                        "Broker {} index lists {} which it does not replicate",
                        broker.id, key
                    )));
                }
            }
            let listed = self
                .replication_groups
                .get(&broker.replication_group)
                .map(|g| g.contains(broker.id))
                .unwrap_or(false);
            if !listed {
                return Err(violation(format!(
                    "Broker {} is not listed in replication group {}",
                    broker.id, broker.replication_group
                )));
            }
        }

        Ok(())
    }
}

fn precondition(message: String) -> RebalancerError {
    RebalancerError::PreconditionFailed(message)
}

fn violation(message: String) -> RebalancerError {
    RebalancerError::InvariantViolation(message)
}
