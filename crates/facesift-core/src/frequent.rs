use serde::{Deserialize, Serialize};

use crate::store::ClusterStore;

/// How many member crops to sample per frequent cluster. A preview for
/// human review, not an exhaustive export.
pub const SAMPLE_CROPS_PER_CLUSTER: usize = 2;

/// A cluster flagged as belonging to a frequently appearing identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequentCluster {
    pub id: usize,
    pub member_count: usize,
}

/// Select clusters with strictly more than `threshold` members, in
/// ascending id order. A cluster with exactly `threshold` members is
/// excluded.
pub fn extract_frequent(store: &ClusterStore, threshold: usize) -> Vec<FrequentCluster> {
    store
        .clusters()
        .iter()
        .filter(|c| c.members.len() > threshold)
        .map(|c| FrequentCluster {
            id: c.id,
            member_count: c.members.len(),
        })
        .collect()
}
