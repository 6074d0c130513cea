//! Access to the cluster's coordination store.

use tracing::info;

use crate::models::{Assignment, ClusterMetadata, ReassignmentPlan};
use crate::RebalancerError;

/// Capability the rebalancer needs from the coordination store: a metadata
/// read, the pending-reassignment flag, and plan submission.
pub trait ClusterCoordinator {
    fn cluster_metadata(&self) -> Result<ClusterMetadata, RebalancerError>;

    fn is_reassignment_pending(&self) -> Result<bool, RebalancerError>;

    fn submit_reassignment(&mut self, plan: &ReassignmentPlan) -> Result<(), RebalancerError>;
}

/// Coordinator backed by a metadata snapshot held in memory.
///
/// A submitted plan stays pending until [`complete_reassignment`] folds it
/// into the held assignment.
///
/// [`complete_reassignment`]: InMemoryCoordinator::complete_reassignment
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoordinator {
    metadata: ClusterMetadata,
    pending: Option<ReassignmentPlan>,
    submitted: Vec<ReassignmentPlan>,
}

impl InMemoryCoordinator {
    pub fn new(metadata: ClusterMetadata) -> Self {
        Self {
            metadata,
            pending: None,
            submitted: Vec::new(),
        }
    }

    /// Pretend another reassignment is already running.
    pub fn with_pending(mut self, plan: ReassignmentPlan) -> Self {
        self.pending = Some(plan);
        self
    }

    pub fn submitted(&self) -> &[ReassignmentPlan] {
        &self.submitted
    }

    pub fn metadata(&self) -> &ClusterMetadata {
        &self.metadata
    }

    /// Finish the pending reassignment, rewriting the listed partitions. A
    /// plan naming an unknown partition is rejected whole and stays pending.
    pub fn complete_reassignment(&mut self) -> Result<(), RebalancerError> {
        let Some(plan) = self.pending.clone() else {
            return Ok(());
        };
        let changes = Assignment::try_from(plan)?;
        if let Some(key) = changes
            .keys()
            .find(|key| !self.metadata.assignment.contains(key))
        {
            return Err(RebalancerError::Coordinator(format!(
                "Reassignment names unknown partition {}",
                key
            )));
        }

        for (key, replicas) in changes {
            self.metadata.assignment.insert(key, replicas);
        }
        self.pending = None;
        Ok(())
    }
}

impl ClusterCoordinator for InMemoryCoordinator {
    fn cluster_metadata(&self) -> Result<ClusterMetadata, RebalancerError> {
        Ok(self.metadata.clone())
    }

    fn is_reassignment_pending(&self) -> Result<bool, RebalancerError> {
        Ok(self.pending.is_some())
    }

    fn submit_reassignment(&mut self, plan: &ReassignmentPlan) -> Result<(), RebalancerError> {
        if self.pending.is_some() {
            return Err(RebalancerError::Coordinator(
                "A reassignment is already in progress".to_string(),
            ));
        }
        info!(partitions = plan.len(), "Reassignment submitted");
        self.pending = Some(plan.clone());
        self.submitted.push(plan.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartitionKey;

    fn metadata() -> ClusterMetadata {
        ClusterMetadata::builder()
            .broker(1, "a")
            .broker(2, "b")
            .partition("t", 0, [1, 2])
            .build()
    }

    #[test]
    fn test_submit_then_complete() {
        let mut coordinator = InMemoryCoordinator::new(metadata());
        assert!(!coordinator.is_reassignment_pending().unwrap());

        let plan: Assignment = [(PartitionKey::new("t", 0), vec![2, 1])].into_iter().collect();
        coordinator.submit_reassignment(&plan.to_plan()).unwrap();
        assert!(coordinator.is_reassignment_pending().unwrap());
        assert_eq!(coordinator.submitted().len(), 1);

        coordinator.complete_reassignment().unwrap();
        assert!(!coordinator.is_reassignment_pending().unwrap());
        assert_eq!(
            coordinator.metadata().assignment.get(&PartitionKey::new("t", 0)),
            Some(&[2, 1][..])
        );
    }

    #[test]
    fn test_submit_rejected_while_pending() {
        let mut coordinator =
            InMemoryCoordinator::new(metadata()).with_pending(ReassignmentPlan::new(Vec::new()));
        let result = coordinator.submit_reassignment(&ReassignmentPlan::new(Vec::new()));
        assert!(matches!(result, Err(RebalancerError::Coordinator(_))));
        assert!(coordinator.submitted().is_empty());
    }

    #[test]
    fn test_complete_rejects_unknown_partition() {
        let stray: Assignment = [(PartitionKey::new("gone", 0), vec![1])].into_iter().collect();
        let mut coordinator = InMemoryCoordinator::new(metadata()).with_pending(stray.to_plan());
        assert!(matches!(
            coordinator.complete_reassignment(),
            Err(RebalancerError::Coordinator(_))
        ));
    }

    #[test]
    fn test_rejected_completion_leaves_metadata_untouched() {
        // t-0 sorts before the unknown partition and must not be rewritten.
        let plan: Assignment = [
            (PartitionKey::new("t", 0), vec![2, 1]),
            (PartitionKey::new("zz", 0), vec![1]),
        ]
        .into_iter()
        .collect();
        let before = metadata().assignment;
        let mut coordinator = InMemoryCoordinator::new(metadata()).with_pending(plan.to_plan());

        assert!(coordinator.complete_reassignment().is_err());
        assert_eq!(coordinator.metadata().assignment, before);
        assert!(coordinator.is_reassignment_pending().unwrap());
    }
}
