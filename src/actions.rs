use crate::goals::OptimizationResult;
use crate::models::*;
use crate::stats::ImbalanceStats;
use crate::RebalancerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single change applied to the topology by a balancing phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Move a replica from one broker to another, keeping its list position
    MoveReplica {
        topic: TopicName,
        partition: PartitionId,
        from_broker: BrokerId,
        to_broker: BrokerId,
    },

    /// Hand leadership of a partition to one of its followers
    ElectLeader {
        topic: TopicName,
        partition: PartitionId,
        previous_leader: BrokerId,
        new_leader: BrokerId,
    },
}

impl Action {
    pub fn move_replica(key: &PartitionKey, from_broker: BrokerId, to_broker: BrokerId) -> Self {
        Action::MoveReplica {
            topic: key.topic.clone(),
            partition: key.partition,
            from_broker,
            to_broker,
        }
    }

    pub fn elect_leader(key: &PartitionKey, previous_leader: BrokerId, new_leader: BrokerId) -> Self {
        Action::ElectLeader {
            topic: key.topic.clone(),
            partition: key.partition,
            previous_leader,
            new_leader,
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        match self {
            Action::MoveReplica {
                topic, partition, ..
            }
            | Action::ElectLeader {
                topic, partition, ..
            } => PartitionKey::new(topic.clone(), *partition),
        }
    }

    /// Apply this action to the topology through its validating mutators
    pub fn apply(&self, topology: &mut ClusterTopology) -> Result<(), RebalancerError> {
        let key = self.partition_key();
        match self {
            Action::MoveReplica {
                from_broker,
                to_broker,
                ..
            } => topology.move_replica(&key, *from_broker, *to_broker),
            Action::ElectLeader { new_leader, .. } => topology.promote_leader(&key, *new_leader),
        }
    }

    pub fn is_movement(&self) -> bool {
        matches!(self, Action::MoveReplica { .. })
    }

    /// Get the brokers affected by this action
    pub fn affected_brokers(&self) -> Vec<BrokerId> {
        match self {
            Action::MoveReplica {
                from_broker,
                to_broker,
                ..
            } => vec![*from_broker, *to_broker],
            Action::ElectLeader {
                previous_leader,
                new_leader,
                ..
            } => vec![*previous_leader, *new_leader],
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> String {
        match self {
            Action::MoveReplica {
                topic,
                partition,
                from_broker,
                to_broker,
            } => format!(
                "Move replica of {}-{} from broker {} to {}",
                topic, partition, from_broker, to_broker
            ),
            Action::ElectLeader {
                topic,
                partition,
                previous_leader,
                new_leader,
            } => format!(
                "Elect broker {} as leader for {}-{} (was {})",
                new_leader, topic, partition, previous_leader
            ),
        }
    }
}

/// How a partition's replica list differs between two assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionChange {
    Unchanged,
    /// Same replica set, different order
    LeaderChange,
    /// Replica set differs; data has to be copied
    Movement,
}

pub fn classify_change(base: &[BrokerId], candidate: &[BrokerId]) -> PartitionChange {
    if base == candidate {
        return PartitionChange::Unchanged;
    }
    let base_set: BTreeSet<_> = base.iter().collect();
    let candidate_set: BTreeSet<_> = candidate.iter().collect();
    if base_set == candidate_set {
        PartitionChange::LeaderChange
    } else {
        PartitionChange::Movement
    }
}

/// Outcome of one rebalance run: the reduced assignment, the executor payload
/// and a report of what each phase did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub assignment: Assignment,
    pub proposed: ReassignmentPlan,
    pub goal_results: Vec<OptimizationResult>,
    pub initial_stats: ImbalanceStats,
    pub final_stats: ImbalanceStats,
    pub summary: PlanSummary,
    pub metadata: PlanMetadata,
}

impl RebalancePlan {
    /// Check if this plan changes nothing
    pub fn is_empty(&self) -> bool {
        self.proposed.is_empty()
    }

    /// Every action taken by the phases, before reduction
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.goal_results.iter().flat_map(|r| r.actions.iter())
    }

    pub fn to_json(&self) -> Result<String, RebalancerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub goals_used: Vec<String>,
    pub cluster_stats: Option<ClusterStats>,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            created_at: Some(chrono::Utc::now()),
            goals_used: Vec::new(),
            cluster_stats: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub broker_count: usize,
    pub alive_broker_count: usize,
    pub replication_group_count: usize,
    pub topic_count: usize,
    pub partition_count: usize,
    pub replica_count: usize,
}

impl ClusterStats {
    pub fn from_topology(topology: &ClusterTopology) -> Self {
        Self {
            broker_count: topology.brokers().count(),
            alive_broker_count: topology.alive_brokers().count(),
            replication_group_count: topology.replication_groups().count(),
            topic_count: topology.topics().count(),
            partition_count: topology.partition_count(),
            replica_count: topology.partitions().map(|p| p.replication_factor()).sum(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Actions the phases took on the working topology
    pub balancing_actions: usize,
    /// Partitions whose replica set changes in the reduced plan
    pub movements: usize,
    /// Partitions whose leader alone changes in the reduced plan
    pub leader_changes: usize,
    /// Changed partitions before reduction
    pub total_changes: usize,
}

impl PlanSummary {
    pub fn kept_changes(&self) -> usize {
        self.movements + self.leader_changes
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Balancing Actions: {}, Movements: {}, Leader Changes: {}, Kept: {} of {} changed partitions",
            self.balancing_actions,
            self.movements,
            self.leader_changes,
            self.kept_changes(),
            self.total_changes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_change() {
        assert_eq!(classify_change(&[1, 2], &[1, 2]), PartitionChange::Unchanged);
        assert_eq!(classify_change(&[1, 2], &[2, 1]), PartitionChange::LeaderChange);
        assert_eq!(classify_change(&[1, 2], &[1, 3]), PartitionChange::Movement);
        assert_eq!(classify_change(&[1, 2, 3], &[3, 2, 4]), PartitionChange::Movement);
    }

    #[test]
    fn test_apply_actions() {
        let metadata = ClusterMetadata::builder()
            .broker(1, "a")
            .broker(2, "a")
            .broker(3, "b")
            .partition("t", 0, [1, 2])
            .build();
        let mut topology = ClusterTopology::from_metadata(&metadata).unwrap();
        let key = PartitionKey::new("t", 0);

        Action::move_replica(&key, 2, 3).apply(&mut topology).unwrap();
        Action::elect_leader(&key, 1, 3).apply(&mut topology).unwrap();
        assert_eq!(topology.partition(&key).unwrap().replicas(), &[3, 1]);

        let rejected = Action::move_replica(&key, 2, 3).apply(&mut topology);
        assert!(matches!(rejected, Err(RebalancerError::InvariantViolation(_))));
    }

    #[test]
    fn test_action_description_and_brokers() {
        let key = PartitionKey::new("orders", 4);
        let action = Action::move_replica(&key, 1, 7);
        assert_eq!(action.description(), "Move replica of orders-4 from broker 1 to 7");
        assert_eq!(action.affected_brokers(), vec![1, 7]);
        assert_eq!(action.partition_key(), key);
        assert!(action.is_movement());
        assert!(!Action::elect_leader(&key, 1, 7).is_movement());
    }

    #[test]
    fn test_summary_display() {
        let summary = PlanSummary {
            balancing_actions: 9,
            movements: 1,
            leader_changes: 3,
            total_changes: 6,
        };
        assert_eq!(summary.kept_changes(), 4);
        assert_eq!(
            summary.to_string(),
            "Balancing Actions: 9, Movements: 1, Leader Changes: 3, Kept: 4 of 6 changed partitions"
        );
    }
}
