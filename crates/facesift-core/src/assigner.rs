//! Incremental greedy cluster assignment.
//!
//! Each incoming face is tested against existing clusters in ascending id
//! order. A cluster matches only if the comparator agrees for **every**
//! current member — a conjunctive consensus rule, deliberately stricter
//! than majority vote so that one admitted lookalike cannot drag a whole
//! cluster toward a second identity. The cost is fragmentation: a single
//! outlier member can permanently block further matches to its cluster.
//!
//! Output is order-dependent. Feeding the same faces in a different order
//! can legitimately produce different cluster boundaries and ids, so
//! callers must present faces in one fixed, reproducible order.

use crate::comparator::Comparator;
use crate::store::ClusterStore;
use crate::types::FaceRecord;

/// Assign `face` to the first cluster whose members all match it, or to a
/// fresh cluster when none does. Returns the cluster id the face landed in.
///
/// Worst case this costs one comparator call per face already assigned
/// (linear scan over clusters, all members of each), which is intrinsic to
/// the all-must-agree rule: there is no single centroid to short-circuit
/// against.
pub fn assign(store: &mut ClusterStore, comparator: &dyn Comparator, face: FaceRecord) -> usize {
    let matched = store
        .clusters()
        .iter()
        .find(|cluster| {
            cluster
                .members
                .iter()
                .all(|member| comparator.matches(&member.embedding, &face.embedding))
        })
        .map(|cluster| cluster.id);

    if let Some(id) = matched {
        if let Some(cluster) = store.cluster_mut(id) {
            cluster.members.push(face);
            return id;
        }
    }
    store.create_with(face)
}
