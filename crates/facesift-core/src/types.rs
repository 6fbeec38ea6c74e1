use std::path::Path;

use serde::{Deserialize, Serialize};

/// Face embedding vector (512-dimensional for ArcFace), L2-normalized
/// at extraction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance to another embedding. For L2-normalized vectors
    /// this is monotone in cosine distance.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Pixel rectangle of a detected face, as integer offsets from the image
/// origin: `top`/`bottom` are row offsets, `left`/`right` column offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// One detected face: what the embedding source hands to the clustering
/// loop before it is tied to an image.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub embedding: Embedding,
    pub face_box: FaceBox,
}

/// A face observation tied to its source image. Created once per detected
/// face and immutable thereafter; owned by exactly one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub image_path: String,
    pub image_name: String,
    pub embedding: Embedding,
    pub face_box: FaceBox,
}

/// Produces zero or more detected faces for an image on disk.
///
/// An empty result means no face was found — a valid outcome, not an
/// error. Implementations may be stateful (ONNX sessions), hence
/// `&mut self`.
pub trait EmbeddingSource {
    fn scan(
        &mut self,
        image_path: &Path,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error + Send + Sync>>;
}
