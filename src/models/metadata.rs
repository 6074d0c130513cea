use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Assignment, BrokerId, PartitionId, PartitionKey, ReplicationGroupId};
use crate::RebalancerError;

/// A broker as reported by the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerMetadata {
    pub id: BrokerId,
    #[serde(default = "default_alive")]
    pub is_alive: bool,
}

fn default_alive() -> bool {
    true
}

/// Point-in-time read of the cluster: brokers, their replication groups,
/// and the current replica assignment.
///
/// Brokers referenced by the assignment but absent from `brokers` are
/// tombstoned when the topology is built; they still need an entry in
/// `replication_groups`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub brokers: Vec<BrokerMetadata>,
    pub replication_groups: BTreeMap<BrokerId, ReplicationGroupId>,
    pub assignment: Assignment,
}

impl ClusterMetadata {
    pub fn builder() -> ClusterMetadataBuilder {
        ClusterMetadataBuilder::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, RebalancerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, RebalancerError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Brokers eligible to receive new replicas.
    pub fn live_brokers(&self) -> BTreeSet<BrokerId> {
        self.brokers
            .iter()
            .filter(|b| b.is_alive)
            .map(|b| b.id)
            .collect()
    }
}

/// Fluent construction of [`ClusterMetadata`], mostly for tests and demos.
#[derive(Debug, Default)]
pub struct ClusterMetadataBuilder {
    metadata: ClusterMetadata,
}

impl ClusterMetadataBuilder {
    pub fn broker(mut self, id: BrokerId, group: impl Into<ReplicationGroupId>) -> Self {
        self.metadata.brokers.push(BrokerMetadata { id, is_alive: true });
        self.metadata.replication_groups.insert(id, group.into());
        self
    }

    pub fn dead_broker(mut self, id: BrokerId, group: impl Into<ReplicationGroupId>) -> Self {
        self.metadata.brokers.push(BrokerMetadata {
            id,
            is_alive: false,
        });
        self.metadata.replication_groups.insert(id, group.into());
        self
    }

    pub fn partition(
        mut self,
        topic: &str,
        partition: PartitionId,
        replicas: impl Into<Vec<BrokerId>>,
    ) -> Self {
        self.metadata
            .assignment
            .insert(PartitionKey::new(topic, partition), replicas.into());
        self
    }

    pub fn build(self) -> ClusterMetadata {
        self.metadata
    }
}
