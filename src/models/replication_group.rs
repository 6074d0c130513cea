use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{BrokerId, ReplicationGroupId};

/// A fault domain (rack, availability zone) grouping brokers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationGroup {
    pub id: ReplicationGroupId,
    pub brokers: BTreeSet<BrokerId>,
}

impl ReplicationGroup {
    pub fn new(id: impl Into<ReplicationGroupId>) -> Self {
        Self {
            id: id.into(),
            brokers: BTreeSet::new(),
        }
    }

    pub fn contains(&self, broker: BrokerId) -> bool {
        self.brokers.contains(&broker)
    }
}
