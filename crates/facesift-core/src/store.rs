//! Append-only cluster store.
//!
//! Clusters are kept in a dense vector indexed by id: a new cluster always
//! receives id = current count, and ids are never reassigned. Iteration in
//! ascending id order is part of the clustering contract — it decides which
//! cluster wins when a face could match more than one.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FaceRecord;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("decode: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// A growing group of face records believed to belong to one identity.
///
/// Born with exactly one member; mutated only by appending. No removal,
/// no merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<FaceRecord>,
}

/// Ordered collection of all clusters discovered so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStore {
    clusters: Vec<Cluster>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Clusters in ascending id order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: usize) -> Option<&Cluster> {
        self.clusters.get(id)
    }

    pub fn cluster_mut(&mut self, id: usize) -> Option<&mut Cluster> {
        self.clusters.get_mut(id)
    }

    /// Create a new cluster holding `face` as its sole member and return
    /// its id (= previous cluster count).
    pub fn create_with(&mut self, face: FaceRecord) -> usize {
        let id = self.clusters.len();
        self.clusters.push(Cluster {
            id,
            members: vec![face],
        });
        id
    }

    /// Total face records across all clusters.
    pub fn total_faces(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }

    /// Persist the full cluster mapping as a bincode blob.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = bincode::serde::encode_to_vec(&self.clusters, bincode::config::standard())?;
        fs::write(path, bytes)?;
        tracing::info!(path = %path.display(), clusters = self.len(), "saved cluster store");
        Ok(())
    }

    /// Read back a cluster mapping written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes = fs::read(path)?;
        let (clusters, _) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(Self { clusters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Embedding, FaceBox};

    fn face(val: f32) -> FaceRecord {
        FaceRecord {
            image_path: format!("imgs/{val}.jpg"),
            image_name: format!("{val}.jpg"),
            embedding: Embedding::new(vec![val]),
            face_box: FaceBox {
                top: 0,
                right: 10,
                bottom: 10,
                left: 0,
            },
        }
    }

    #[test]
    fn test_ids_dense_and_contiguous() {
        let mut store = ClusterStore::new();
        assert_eq!(store.create_with(face(0.0)), 0);
        assert_eq!(store.create_with(face(1.0)), 1);
        assert_eq!(store.create_with(face(2.0)), 2);
        for (i, c) in store.clusters().iter().enumerate() {
            assert_eq!(c.id, i);
        }
    }

    #[test]
    fn test_new_cluster_has_one_member() {
        let mut store = ClusterStore::new();
        let id = store.create_with(face(0.0));
        assert_eq!(store.cluster(id).map(|c| c.members.len()), Some(1));
    }

    #[test]
    fn test_append_via_cluster_mut() {
        let mut store = ClusterStore::new();
        let id = store.create_with(face(0.0));
        store
            .cluster_mut(id)
            .map(|c| c.members.push(face(0.1)))
            .expect("cluster exists");
        assert_eq!(store.cluster(id).map(|c| c.members.len()), Some(2));
        assert_eq!(store.total_faces(), 2);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let store = ClusterStore::new();
        assert!(store.cluster(0).is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut store = ClusterStore::new();
        let id = store.create_with(face(0.25));
        store
            .cluster_mut(id)
            .map(|c| c.members.push(face(0.5)))
            .expect("cluster exists");
        store.create_with(face(9.0));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("clusters.bin");
        store.save(&path).expect("save");

        let restored = ClusterStore::load(&path).expect("load");
        assert_eq!(restored, store);
    }
}
