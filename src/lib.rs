// Kafka Cluster Balancer Library
// Count-based partition placement rebalancing across replication groups,
// brokers and leaders

pub mod actions;
pub mod constraints;
pub mod coordinator;
pub mod goals;
pub mod models;
pub mod optimizer;
pub mod reducer;
pub mod stats;
pub mod validation;

pub use actions::{Action, PartitionChange, PlanSummary, RebalancePlan};
pub use constraints::BalancingConstraints;
pub use coordinator::{ClusterCoordinator, InMemoryCoordinator};
pub use goals::{BalancingPhase, Goal, OptimizationResult};
pub use models::{Assignment, ClusterMetadata, ClusterTopology, PartitionKey, ReassignmentPlan};
pub use optimizer::Optimizer;
pub use reducer::{reduce_plan, ReducedPlan};
pub use stats::ImbalanceStats;
pub use validation::{validate_plan, ValidationError};

use actions::{ClusterStats, PlanMetadata};
use optimizer::GoalReport;
use tracing::{error, info, warn};

/// Main entry point for generating rebalance proposals
pub struct Rebalancer {
    constraints: BalancingConstraints,
    optimizer: Optimizer,
}

impl Rebalancer {
    pub fn new(constraints: BalancingConstraints) -> Result<Self, RebalancerError> {
        constraints.validate()?;
        if !constraints.any_phase_enabled() {
            warn!("No balancing phase enabled, plans will be empty");
        }
        Ok(Self {
            optimizer: Optimizer::from_constraints(&constraints),
            constraints,
        })
    }

    pub fn constraints(&self) -> &BalancingConstraints {
        &self.constraints
    }

    /// Balance a copy of the cluster described by `metadata`, validate the
    /// result and reduce it to the configured change budget
    pub fn generate_plan(&self, metadata: &ClusterMetadata) -> Result<RebalancePlan, RebalancerError> {
        let mut topology = ClusterTopology::from_metadata(metadata)?;
        let cluster_stats = ClusterStats::from_topology(&topology);
        let report = self.optimizer.optimize(&mut topology)?;

        let baseline = topology.initial_assignment();
        let candidate = topology.assignment();
        if let Err(err) = validate_plan(baseline, &candidate, &topology.live_broker_ids()) {
            error!(error = %err, "Balanced assignment failed validation");
            return Err(err.into());
        }

        let reduced = reduce_plan(
            baseline,
            &candidate,
            self.constraints.max_partition_movements,
            self.constraints.max_leader_changes,
        );
        let summary = PlanSummary {
            balancing_actions: report.action_count(),
            movements: reduced.movements.len(),
            leader_changes: reduced.leader_changes.len(),
            total_changes: reduced.total_changes,
        };
        info!(%summary, "Generated rebalance plan");

        Ok(RebalancePlan {
            proposed: reduced.proposed_plan(),
            assignment: reduced.assignment,
            goal_results: report.results,
            initial_stats: report.initial_stats,
            final_stats: report.final_stats,
            summary,
            metadata: PlanMetadata {
                goals_used: self.optimizer.goal_names(),
                cluster_stats: Some(cluster_stats),
                ..Default::default()
            },
        })
    }

    /// Full rebalance against a live cluster: refuse to run while a
    /// reassignment is in flight, plan, and submit the reduced plan when
    /// `apply` is set
    pub fn run<C: ClusterCoordinator>(
        &self,
        coordinator: &mut C,
        apply: bool,
    ) -> Result<RebalancePlan, RebalancerError> {
        if coordinator.is_reassignment_pending()? {
            error!("Previous reassignment pending, refusing to rebalance");
            return Err(RebalancerError::ReassignmentPending);
        }

        let metadata = coordinator.cluster_metadata()?;
        let plan = self.generate_plan(&metadata)?;

        if plan.is_empty() {
            info!("Cluster already balanced, nothing to submit");
        } else if apply {
            coordinator.submit_reassignment(&plan.proposed)?;
            info!(partitions = plan.proposed.len(), "Submitted reassignment plan");
        }
        Ok(plan)
    }

    /// Check how balanced the cluster is along each enabled goal
    pub fn goal_report(&self, metadata: &ClusterMetadata) -> Result<Vec<GoalReport>, RebalancerError> {
        let topology = ClusterTopology::from_metadata(metadata)?;
        Ok(self.optimizer.goal_report(&topology))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RebalancerError {
    #[error("Plan validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("A partition reassignment is already in progress")]
    ReassignmentPending,

    #[error("Coordinator error: {0}")]
    Coordinator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
