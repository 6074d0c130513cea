use crate::RebalancerError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Constraints that control which phases run and how much of the result is
/// handed to the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancingConstraints {
    /// Spread replicas across replication groups
    pub rebalance_replication_groups: bool,

    /// Even out partition counts across brokers of a group
    pub rebalance_brokers: bool,

    /// Even out leadership across brokers
    pub rebalance_leaders: bool,

    /// Maximum partitions whose replica set may change in one plan
    pub max_partition_movements: usize,

    /// Maximum partitions whose leader alone may change in one plan
    pub max_leader_changes: usize,

    /// Run the topology invariant check after every phase
    pub verify_invariants: bool,
}

impl Default for BalancingConstraints {
    fn default() -> Self {
        Self {
            rebalance_replication_groups: true,
            rebalance_brokers: true,
            rebalance_leaders: true,
            max_partition_movements: 1,
            max_leader_changes: 5,
            verify_invariants: cfg!(debug_assertions),
        }
    }
}

impl BalancingConstraints {
    /// Only spread replicas over replication groups
    pub fn replication_groups_only() -> Self {
        Self {
            rebalance_brokers: false,
            rebalance_leaders: false,
            ..Default::default()
        }
    }

    /// Only balance partition counts within groups
    pub fn brokers_only() -> Self {
        Self {
            rebalance_replication_groups: false,
            rebalance_leaders: false,
            ..Default::default()
        }
    }

    /// Only move leadership; replica sets stay as they are
    pub fn leaders_only() -> Self {
        Self {
            rebalance_replication_groups: false,
            rebalance_brokers: false,
            ..Default::default()
        }
    }

    pub fn with_budget(mut self, max_partition_movements: usize, max_leader_changes: usize) -> Self {
        self.max_partition_movements = max_partition_movements;
        self.max_leader_changes = max_leader_changes;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, RebalancerError> {
        let constraints: Self = serde_json::from_str(json)?;
        constraints.validate()?;
        Ok(constraints)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, RebalancerError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), RebalancerError> {
        if self.max_partition_movements == 0 {
            return Err(RebalancerError::PreconditionFailed(
                "max_partition_movements must be at least 1".to_string(),
            ));
        }
        if self.max_leader_changes == 0 {
            return Err(RebalancerError::PreconditionFailed(
                "max_leader_changes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn any_phase_enabled(&self) -> bool {
        self.rebalance_replication_groups || self.rebalance_brokers || self.rebalance_leaders
    }
}
