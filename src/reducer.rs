//! Trims a candidate assignment down to a bounded number of changes.

use tracing::info;

use crate::actions::{classify_change, PartitionChange};
use crate::models::{Assignment, PartitionKey, ReassignmentPlan};

/// Candidate assignment after reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedPlan {
    /// Full mapping: kept changes applied, everything else as in the baseline
    pub assignment: Assignment,
    /// Partitions kept whose replica set changes
    pub movements: Vec<PartitionKey>,
    /// Partitions kept whose leader alone changes
    pub leader_changes: Vec<PartitionKey>,
    /// Changed partitions before reduction
    pub total_changes: usize,
}

impl ReducedPlan {
    pub fn kept_changes(&self) -> usize {
        self.movements.len() + self.leader_changes.len()
    }

    /// Executor payload holding only the kept partitions.
    pub fn proposed_plan(&self) -> ReassignmentPlan {
        self.movements
            .iter()
            .chain(&self.leader_changes)
            .filter_map(|key| {
                self.assignment
                    .get(key)
                    .map(|replicas| (key.clone(), replicas.to_vec()))
            })
            .collect::<Assignment>()
            .to_plan()
    }
}

/// Keep at most `max_movements` replica-set changes and `max_leader_changes`
/// leader-only changes of `candidate`, each in partition key order. Every
/// other partition reverts to its `baseline` replica list.
pub fn reduce_plan(
    baseline: &Assignment,
    candidate: &Assignment,
    max_movements: usize,
    max_leader_changes: usize,
) -> ReducedPlan {
    let mut movements = Vec::new();
    let mut leader_changes = Vec::new();
    let mut total_changes = 0;

    for (key, replicas) in candidate.iter() {
        let base = baseline.get(key).unwrap_or(&[]);
        match classify_change(base, replicas) {
            PartitionChange::Unchanged => continue,
            PartitionChange::Movement => movements.push(key.clone()),
            PartitionChange::LeaderChange => leader_changes.push(key.clone()),
        }
        total_changes += 1;
    }
    movements.truncate(max_movements);
    leader_changes.truncate(max_leader_changes);

    let mut assignment = baseline.clone();
    for key in movements.iter().chain(&leader_changes) {
        if let Some(replicas) = candidate.get(key) {
            assignment.insert(key.clone(), replicas.to_vec());
        }
    }

    info!(
        total_changes,
        movements = movements.len(),
        leader_changes = leader_changes.len(),
        "Reduced plan"
    );

    ReducedPlan {
        assignment,
        movements,
        leader_changes,
        total_changes,
    }
}
