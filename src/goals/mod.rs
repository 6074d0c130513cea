use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::models::ClusterTopology;
use crate::RebalancerError;

/// Balancing phases, in the order they always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BalancingPhase {
    ReplicationGroup = 0,
    Broker = 1,
    Leader = 2,
}

/// Result of running one goal over the topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub goal_name: String,
    pub phase: BalancingPhase,
    pub actions: Vec<Action>,
    pub score_before: usize,
    pub score_after: usize, // 0 = balanced along this goal's axis
}

impl OptimizationResult {
    pub fn improvement(&self) -> isize {
        self.score_before as isize - self.score_after as isize
    }
}

/// Core trait for balancing goals
pub trait Goal: Send + Sync {
    /// Name of this goal
    fn name(&self) -> &str;

    /// Phase this goal belongs to; decides execution order
    fn phase(&self) -> BalancingPhase;

    /// Imbalance this goal targets; 0 means nothing left to do
    fn score(&self, topology: &ClusterTopology) -> usize;

    /// Mutate the topology towards balance, returning the actions applied
    fn rebalance(&self, topology: &mut ClusterTopology) -> Result<Vec<Action>, RebalancerError>;

    fn is_satisfied(&self, topology: &ClusterTopology) -> bool {
        self.score(topology) == 0
    }
}

// Module declarations
mod broker_distribution;
mod leader_distribution;
mod replication_group;

// Re-exports
pub use broker_distribution::BrokerDistributionGoal;
pub use leader_distribution::LeaderDistributionGoal;
pub use replication_group::ReplicationGroupGoal;
