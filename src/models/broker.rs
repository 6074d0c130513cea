use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{BrokerId, PartitionKey, ReplicationGroupId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub replication_group: ReplicationGroupId,
    pub is_alive: bool,
    /// Partitions this broker holds a replica of. Maintained by
    /// `ClusterTopology`'s mutators, never edited directly.
    pub(crate) partitions: BTreeSet<PartitionKey>,
}

impl Broker {
    pub fn new(id: BrokerId, replication_group: impl Into<ReplicationGroupId>) -> Self {
        Self {
            id,
            replication_group: replication_group.into(),
            is_alive: true,
            partitions: BTreeSet::new(),
        }
    }

    /// A broker that only appears as a legacy replica holder.
    pub fn tombstoned(id: BrokerId, replication_group: impl Into<ReplicationGroupId>) -> Self {
        Self {
            is_alive: false,
            ..Self::new(id, replication_group)
        }
    }

    pub fn partitions(&self) -> impl Iterator<Item = &PartitionKey> {
        self.partitions.iter()
    }

    pub fn has_partition(&self, key: &PartitionKey) -> bool {
        self.partitions.contains(key)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Whether this broker may receive a new replica of `key`.
    pub fn can_accept(&self, key: &PartitionKey) -> bool {
        self.is_alive && !self.partitions.contains(key)
    }
}
