use std::fmt;

use serde::{Deserialize, Serialize};

// Type aliases used across models
pub type BrokerId = u32;
pub type TopicName = String;
pub type PartitionId = u32;
pub type ReplicationGroupId = String;

/// Identifies a single partition: `(topic, partition-index)`.
///
/// Ordering is by topic name, then index. Everything that must be
/// deterministic (tie-breaks, plan reduction) iterates in this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl PartitionKey {
    pub fn new(topic: impl Into<TopicName>, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

// Module declarations
mod assignment;
mod broker;
mod cluster;
mod metadata;
mod replication_group;
mod topic;

// Re-exports
pub use assignment::{Assignment, PlanPartition, ReassignmentPlan, PLAN_VERSION};
pub use broker::Broker;
pub use cluster::ClusterTopology;
pub use metadata::{BrokerMetadata, ClusterMetadata, ClusterMetadataBuilder};
pub use replication_group::ReplicationGroup;
pub use topic::{Partition, Topic};
