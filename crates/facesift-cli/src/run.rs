//! The streaming phase: one pass over the archive, strictly sequential.
//!
//! Images are visited in file-name order so reruns see the same stream;
//! cluster boundaries and ids depend on that order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use facesift_core::{assign, BucketReport, ClusterStore, Comparator, EmbeddingSource, FaceRecord};

/// List directory files in one fixed, reproducible order (by path).
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Classify every image by face count and assign every detected face to
/// an identity cluster.
///
/// An image the source cannot read is logged and bucketed as no-face
/// instead of aborting the run.
pub fn process_directory<S: EmbeddingSource>(
    source: &mut S,
    comparator: &dyn Comparator,
    input_dir: &Path,
) -> Result<(ClusterStore, BucketReport)> {
    let paths = list_images(input_dir)?;
    tracing::info!(images = paths.len(), dir = %input_dir.display(), "processing archive");

    let mut store = ClusterStore::new();
    let mut buckets = BucketReport::new();

    for path in &paths {
        let image_path = path.to_string_lossy().into_owned();
        let image_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.clone());

        let faces = match source.scan(path) {
            Ok(faces) => faces,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable image");
                Vec::new()
            }
        };

        buckets.record(&image_path, faces.len());

        for face in faces {
            let record = FaceRecord {
                image_path: image_path.clone(),
                image_name: image_name.clone(),
                embedding: face.embedding,
                face_box: face.face_box,
            };
            let id = assign(&mut store, comparator, record);
            tracing::debug!(path = %path.display(), cluster = id, "assigned face");
        }
    }

    tracing::info!(
        clusters = store.len(),
        faces = store.total_faces(),
        "clustering complete"
    );
    for cluster in store.clusters() {
        tracing::debug!(id = cluster.id, members = cluster.members.len(), "cluster");
    }

    Ok((store, buckets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use facesift_core::{DetectedFace, DistanceComparator, Embedding, FaceBox};
    use std::collections::{HashMap, HashSet};

    /// Canned embedding source keyed by file name.
    struct StubSource {
        faces: HashMap<String, Vec<DetectedFace>>,
        unreadable: HashSet<String>,
    }

    impl EmbeddingSource for StubSource {
        fn scan(
            &mut self,
            image_path: &Path,
        ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error + Send + Sync>> {
            let name = image_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.unreadable.contains(&name) {
                return Err("corrupt image data".into());
            }
            Ok(self.faces.get(&name).cloned().unwrap_or_default())
        }
    }

    fn detected(val: f32) -> DetectedFace {
        DetectedFace {
            embedding: Embedding::new(vec![val]),
            face_box: FaceBox {
                top: 0,
                right: 16,
                bottom: 16,
                left: 0,
            },
        }
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").expect("touch file");
        }
    }

    #[test]
    fn test_list_images_sorted_by_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), &["c.jpg", "a.jpg", "b.jpg"]);
        let names: Vec<_> = list_images(dir.path())
            .expect("list")
            .iter()
            .map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            names,
            [
                Some("a.jpg".to_string()),
                Some("b.jpg".to_string()),
                Some("c.jpg".to_string())
            ]
        );
    }

    #[test]
    fn test_list_images_skips_subdirectories() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), &["a.jpg"]);
        fs::create_dir(dir.path().join("nested")).expect("mkdir");
        assert_eq!(list_images(dir.path()).expect("list").len(), 1);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        assert!(list_images(&missing).is_err());
    }

    #[test]
    fn test_two_identities_three_images() {
        // A and B match each other, C matches neither: cluster 0 = {A, B},
        // cluster 1 = {C}, and all three land in the single-face bucket.
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), &["a.jpg", "b.jpg", "c.jpg"]);

        let mut source = StubSource {
            faces: HashMap::from([
                ("a.jpg".to_string(), vec![detected(0.0)]),
                ("b.jpg".to_string(), vec![detected(0.3)]),
                ("c.jpg".to_string(), vec![detected(7.0)]),
            ]),
            unreadable: HashSet::new(),
        };

        let (store, buckets) = process_directory(
            &mut source,
            &DistanceComparator::new(0.6),
            dir.path(),
        )
        .expect("process");

        assert_eq!(store.len(), 2);
        assert_eq!(store.cluster(0).map(|c| c.members.len()), Some(2));
        assert_eq!(store.cluster(1).map(|c| c.members.len()), Some(1));
        assert_eq!(buckets.single_face.len(), 3);
        assert!(buckets.no_face.is_empty());
        assert!(buckets.multi_face.is_empty());
    }

    #[test]
    fn test_multi_face_image_contributes_each_face() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), &["group.jpg"]);

        let mut source = StubSource {
            faces: HashMap::from([(
                "group.jpg".to_string(),
                vec![detected(0.0), detected(9.0)],
            )]),
            unreadable: HashSet::new(),
        };

        let (store, buckets) = process_directory(
            &mut source,
            &DistanceComparator::new(0.6),
            dir.path(),
        )
        .expect("process");

        assert_eq!(buckets.multi_face.len(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_faces(), 2);
    }

    #[test]
    fn test_unreadable_image_bucketed_as_no_face() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), &["bad.jpg", "good.jpg"]);

        let mut source = StubSource {
            faces: HashMap::from([("good.jpg".to_string(), vec![detected(1.0)])]),
            unreadable: HashSet::from(["bad.jpg".to_string()]),
        };

        let (store, buckets) = process_directory(
            &mut source,
            &DistanceComparator::new(0.6),
            dir.path(),
        )
        .expect("process");

        assert_eq!(buckets.no_face.len(), 1);
        assert!(buckets.no_face[0].ends_with("bad.jpg"));
        assert_eq!(buckets.single_face.len(), 1);
        assert_eq!(store.total_faces(), 1);
    }

    #[test]
    fn test_empty_scan_is_no_face_not_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), &["landscape.jpg"]);

        let mut source = StubSource {
            faces: HashMap::new(),
            unreadable: HashSet::new(),
        };

        let (store, buckets) = process_directory(
            &mut source,
            &DistanceComparator::new(0.6),
            dir.path(),
        )
        .expect("process");

        assert_eq!(buckets.no_face.len(), 1);
        assert!(store.is_empty());
    }
}
