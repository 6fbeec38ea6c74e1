//! facesift-core — incremental greedy face clustering engine.
//!
//! Consumes a stream of face embeddings (one or more per image) and assigns
//! each to an existing identity cluster or starts a new one. Clustering is
//! unsupervised and open-ended: there is no predefined number of identities.
//! A strict all-members-must-match consensus rule keeps clusters from
//! absorbing lookalikes at the cost of occasional fragmentation.

pub mod assigner;
pub mod buckets;
pub mod comparator;
pub mod frequent;
pub mod store;
pub mod types;

pub use assigner::assign;
pub use buckets::{BucketReport, FaceCount};
pub use comparator::{Comparator, DistanceComparator};
pub use frequent::{extract_frequent, FrequentCluster, SAMPLE_CROPS_PER_CLUSTER};
pub use store::{Cluster, ClusterStore, StoreError};
pub use types::{DetectedFace, Embedding, EmbeddingSource, FaceBox, FaceRecord};
