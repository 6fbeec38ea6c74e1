use serde::{Deserialize, Serialize};

/// Per-image classification by detected face count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceCount {
    NoFace,
    SingleFace,
    MultiFace,
}

impl FaceCount {
    /// Classify from the number of embeddings detected in one image.
    pub fn classify(embedding_count: usize) -> Self {
        match embedding_count {
            0 => FaceCount::NoFace,
            1 => FaceCount::SingleFace,
            _ => FaceCount::MultiFace,
        }
    }
}

/// Image paths partitioned by face count, in processing order.
///
/// One instance per run; returned to the caller rather than accumulated
/// in globals, so bucket state never outlives the run that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketReport {
    pub no_face: Vec<String>,
    pub single_face: Vec<String>,
    pub multi_face: Vec<String>,
}

impl BucketReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an image and append its path to the matching bucket.
    pub fn record(&mut self, image_path: &str, embedding_count: usize) -> FaceCount {
        let class = FaceCount::classify(embedding_count);
        let bucket = match class {
            FaceCount::NoFace => &mut self.no_face,
            FaceCount::SingleFace => &mut self.single_face,
            FaceCount::MultiFace => &mut self.multi_face,
        };
        bucket.push(image_path.to_string());
        class
    }

    /// Images recorded across all buckets.
    pub fn total(&self) -> usize {
        self.no_face.len() + self.single_face.len() + self.multi_face.len()
    }
}
