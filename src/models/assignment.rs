use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{BrokerId, PartitionId, PartitionKey, TopicName};
use crate::RebalancerError;

/// Version tag of the reassignment JSON format understood by the executor.
pub const PLAN_VERSION: u32 = 1;

/// Full mapping from partition to its ordered replica list at a point in time.
///
/// Serialises as a [`ReassignmentPlan`] so the same type can be written to, and
/// read back from, a plan file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ReassignmentPlan", try_from = "ReassignmentPlan")]
pub struct Assignment {
    partitions: BTreeMap<PartitionKey, Vec<BrokerId>>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PartitionKey, replicas: Vec<BrokerId>) -> Option<Vec<BrokerId>> {
        self.partitions.insert(key, replicas)
    }

    pub fn get(&self, key: &PartitionKey) -> Option<&[BrokerId]> {
        self.partitions.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &PartitionKey) -> bool {
        self.partitions.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PartitionKey> {
        self.partitions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &[BrokerId])> {
        self.partitions.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Every broker id referenced by any replica list.
    pub fn brokers(&self) -> BTreeSet<BrokerId> {
        self.partitions.values().flatten().copied().collect()
    }

    /// Plan payload containing the whole assignment.
    pub fn to_plan(&self) -> ReassignmentPlan {
        ReassignmentPlan::from(self.clone())
    }
}

impl FromIterator<(PartitionKey, Vec<BrokerId>)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (PartitionKey, Vec<BrokerId>)>>(iter: I) -> Self {
        Self {
            partitions: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Assignment {
    type Item = (PartitionKey, Vec<BrokerId>);
    type IntoIter = btree_map::IntoIter<PartitionKey, Vec<BrokerId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.partitions.into_iter()
    }
}

/// Executor-facing reassignment document:
/// `{"version": 1, "partitions": [{"topic": t, "partition": p, "replicas": [..]}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentPlan {
    pub version: u32,
    pub partitions: Vec<PlanPartition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub replicas: Vec<BrokerId>,
}

impl ReassignmentPlan {
    pub fn new(partitions: Vec<PlanPartition>) -> Self {
        Self {
            version: PLAN_VERSION,
            partitions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn to_json(&self) -> Result<String, RebalancerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RebalancerError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<Assignment> for ReassignmentPlan {
    fn from(assignment: Assignment) -> Self {
        let partitions = assignment
            .partitions
            .into_iter()
            .map(|(key, replicas)| PlanPartition {
                topic: key.topic,
                partition: key.partition,
                replicas,
            })
            .collect();
        Self::new(partitions)
    }
}

impl TryFrom<ReassignmentPlan> for Assignment {
    type Error = RebalancerError;

    fn try_from(plan: ReassignmentPlan) -> Result<Self, Self::Error> {
        if plan.version != PLAN_VERSION {
            return Err(RebalancerError::PreconditionFailed(format!(
                "Unsupported reassignment plan version {} (expected {})",
                plan.version, PLAN_VERSION
            )));
        }

        let mut assignment = Assignment::new();
        for entry in plan.partitions {
            let key = PartitionKey::new(entry.topic, entry.partition);
            if assignment.contains(&key) {
                return Err(RebalancerError::PreconditionFailed(format!(
                    "Partition {} listed more than once in plan",
                    key
                )));
            }
            assignment.insert(key, entry.replicas);
        }
        Ok(assignment)
    }
}
