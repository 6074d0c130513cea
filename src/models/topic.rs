use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{BrokerId, PartitionId, PartitionKey, TopicName};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub name: TopicName,
    pub partitions: BTreeSet<PartitionId>,
    pub replication_factor: usize,
}

impl Topic {
    pub fn partition_keys(&self) -> impl Iterator<Item = PartitionKey> + '_ {
        self.partitions
            .iter()
            .map(|id| PartitionKey::new(self.name.clone(), *id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub key: PartitionKey,
    /// Ordered replica list; position 0 is the leader.
    pub(crate) replicas: Vec<BrokerId>,
}

impl Partition {
    pub fn replicas(&self) -> &[BrokerId] {
        &self.replicas
    }

    pub fn leader(&self) -> Option<BrokerId> {
        self.replicas.first().copied()
    }

    pub fn followers(&self) -> &[BrokerId] {
        self.replicas.get(1..).unwrap_or(&[])
    }

    pub fn replication_factor(&self) -> usize {
        self.replicas.len()
    }

    pub fn has_replica(&self, broker: BrokerId) -> bool {
        self.replicas.contains(&broker)
    }

    pub fn position_of(&self, broker: BrokerId) -> Option<usize> {
        self.replicas.iter().position(|b| *b == broker)
    }
}
