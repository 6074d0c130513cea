//! Safety checks a candidate assignment must pass before it may replace the
//! baseline.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::models::{Assignment, BrokerId, PartitionKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Partition {0} is missing from the candidate assignment")]
    MissingPartition(PartitionKey),

    #[error("Partition {0} is not part of the baseline assignment")]
    UnexpectedPartition(PartitionKey),

    #[error("Replication factor of {partition} changed from {baseline} to {candidate}")]
    ReplicationFactorChanged {
        partition: PartitionKey,
        baseline: usize,
        candidate: usize,
    },

    #[error("Partition {partition} is assigned to broker {broker}, which is neither a current replica nor a live broker")]
    UnknownBroker {
        partition: PartitionKey,
        broker: BrokerId,
    },

    #[error("Partition {partition} lists broker {broker} more than once")]
    DuplicateReplica {
        partition: PartitionKey,
        broker: BrokerId,
    },
}

/// Check `candidate` against `baseline`, failing on the first problem.
///
/// A candidate replica is acceptable if it already holds the partition in the
/// baseline or is one of `eligible_brokers`.
pub fn validate_plan(
    baseline: &Assignment,
    candidate: &Assignment,
    eligible_brokers: &BTreeSet<BrokerId>,
) -> Result<(), ValidationError> {
    if let Some(key) = baseline.keys().find(|key| !candidate.contains(key)) {
        return Err(ValidationError::MissingPartition(key.clone()));
    }
    if let Some(key) = candidate.keys().find(|key| !baseline.contains(key)) {
        return Err(ValidationError::UnexpectedPartition(key.clone()));
    }

    for (key, replicas) in candidate.iter() {
        let base = baseline.get(key).unwrap_or(&[]);
        if base.len() != replicas.len() {
            return Err(ValidationError::ReplicationFactorChanged {
                partition: key.clone(),
                baseline: base.len(),
                candidate: replicas.len(),
            });
        }
    }

    for (key, replicas) in candidate.iter() {
        let base = baseline.get(key).unwrap_or(&[]);
        if let Some(broker) = replicas
            .iter()
            .find(|&&b| !base.contains(&b) && !eligible_brokers.contains(&b))
        {
            return Err(ValidationError::UnknownBroker {
                partition: key.clone(),
                broker: *broker,
            });
        }
    }

    for (key, replicas) in candidate.iter() {
        let mut seen = BTreeSet::new();
        if let Some(broker) = replicas.iter().find(|b| !seen.insert(**b)) {
            return Err(ValidationError::DuplicateReplica {
                partition: key.clone(),
                broker: *broker,
            });
        }
    }

    Ok(())
}
