use crate::constraints::BalancingConstraints;
use crate::goals::*;
use crate::models::{BrokerId, ClusterTopology, PartitionKey};
use crate::stats::{self, ImbalanceStats};
use crate::RebalancerError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// The optimizer runs the balancing goals over a topology, one phase after
/// the other
pub struct Optimizer {
    goals: Vec<Box<dyn Goal>>,
    verify_invariants: bool,
}

/// Scores and actions of one optimizer run
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub initial_stats: ImbalanceStats,
    pub final_stats: ImbalanceStats,
    pub results: Vec<OptimizationResult>,
}

impl OptimizationReport {
    pub fn action_count(&self) -> usize {
        self.results.iter().map(|r| r.actions.len()).sum()
    }
}

impl Optimizer {
    pub fn new(mut goals: Vec<Box<dyn Goal>>) -> Self {
        goals.sort_by_key(|g| g.phase());
        Self {
            goals,
            verify_invariants: false,
        }
    }

    /// Run `check_invariants` and the phase isolation checks after each goal
    pub fn with_invariant_checks(mut self, verify: bool) -> Self {
        self.verify_invariants = verify;
        self
    }

    /// Goals for the phases enabled in `constraints`
    pub fn from_constraints(constraints: &BalancingConstraints) -> Self {
        let mut builder = OptimizerBuilder::new().verify_invariants(constraints.verify_invariants);
        if constraints.rebalance_replication_groups {
            builder = builder.add_goal(Box::new(ReplicationGroupGoal));
        }
        if constraints.rebalance_brokers {
            builder = builder.add_goal(Box::new(BrokerDistributionGoal));
        }
        if constraints.rebalance_leaders {
            builder = builder.add_goal(Box::new(LeaderDistributionGoal));
        }
        builder.build()
    }

    pub fn goal_names(&self) -> Vec<String> {
        self.goals.iter().map(|g| g.name().to_string()).collect()
    }

    /// Run every goal in phase order, mutating `topology` in place
    pub fn optimize(
        &self,
        topology: &mut ClusterTopology,
    ) -> Result<OptimizationReport, RebalancerError> {
        let initial_stats = ImbalanceStats::compute(topology);
        info!(stats = %initial_stats, "Imbalance before balancing");

        let mut results = Vec::with_capacity(self.goals.len());
        for goal in &self.goals {
            let score_before = goal.score(topology);
            info!(goal = goal.name(), score = score_before, "Starting phase");

            let before = PlacementSnapshot::capture(topology);
            let actions = goal.rebalance(topology)?;
            let score_after = goal.score(topology);

            if score_after > score_before {
                return Err(RebalancerError::InvariantViolation(format!(
                    "{} raised its imbalance from {} to {}",
                    goal.name(),
                    score_before,
                    score_after
                )));
            }
            if self.verify_invariants {
                topology.check_invariants()?;
                before.check_isolation(goal.phase(), topology)?;
            }

            info!(
                goal = goal.name(),
                score_before,
                score_after,
                actions = actions.len(),
                "Finished phase"
            );
            if score_after > 0 {
                warn!(
                    goal = goal.name(),
                    residual = score_after,
                    "Imbalance remains after phase"
                );
            }

            results.push(OptimizationResult {
                goal_name: goal.name().to_string(),
                phase: goal.phase(),
                actions,
                score_before,
                score_after,
            });
        }

        let final_stats = ImbalanceStats::compute(topology);
        info!(stats = %final_stats, "Imbalance after balancing");

        Ok(OptimizationReport {
            initial_stats,
            final_stats,
            results,
        })
    }

    /// Get a report on how well each goal is satisfied
    pub fn goal_report(&self, topology: &ClusterTopology) -> Vec<GoalReport> {
        self.goals
            .iter()
            .map(|goal| GoalReport {
                name: goal.name().to_string(),
                phase: goal.phase(),
                score: goal.score(topology),
            })
            .collect()
    }
}

/// Per-partition replica sets and group spread, used to confirm that a phase
/// only touched what it is allowed to
struct PlacementSnapshot {
    replica_sets: BTreeMap<PartitionKey, BTreeSet<BrokerId>>,
    group_spread: BTreeMap<PartitionKey, Vec<usize>>,
}

impl PlacementSnapshot {
    fn capture(topology: &ClusterTopology) -> Self {
        let replica_sets = topology
            .partitions()
            .map(|p| (p.key.clone(), p.replicas().iter().copied().collect()))
            .collect();
        let group_spread = topology
            .partitions()
            .map(|p| (p.key.clone(), stats::partition_group_counts(topology, &p.key)))
            .collect();
        Self {
            replica_sets,
            group_spread,
        }
    }

    fn check_isolation(
        &self,
        phase: BalancingPhase,
        topology: &ClusterTopology,
    ) -> Result<(), RebalancerError> {
        let after = Self::capture(topology);
        match phase {
            BalancingPhase::Leader if after.replica_sets != self.replica_sets => {
                Err(RebalancerError::InvariantViolation(
                    "Leader phase changed a replica set".to_string(),
                ))
            }
            BalancingPhase::Broker if after.group_spread != self.group_spread => {
                Err(RebalancerError::InvariantViolation(
                    "Broker phase moved a replica across replication groups".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Report on a single goal's state
#[derive(Debug, Clone)]
pub struct GoalReport {
    pub name: String,
    pub phase: BalancingPhase,
    pub score: usize,
}

impl GoalReport {
    pub fn is_satisfied(&self) -> bool {
        self.score == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} (Phase: {:?}): Imbalance {}",
            self.name, self.phase, self.score
        )
    }
}

/// Builder for creating an Optimizer with a fluent API
pub struct OptimizerBuilder {
    goals: Vec<Box<dyn Goal>>,
    verify_invariants: bool,
}

impl OptimizerBuilder {
    pub fn new() -> Self {
        Self {
            goals: Vec::new(),
            verify_invariants: false,
        }
    }

    pub fn add_goal(mut self, goal: Box<dyn Goal>) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn verify_invariants(mut self, verify: bool) -> Self {
        self.verify_invariants = verify;
        self
    }

    pub fn build(self) -> Optimizer {
        Optimizer::new(self.goals).with_invariant_checks(self.verify_invariants)
    }
}

impl Default for OptimizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
