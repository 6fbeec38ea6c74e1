//! facesift-detect — the embedding source behind the clustering engine.
//!
//! SCRFD face detection plus ArcFace embedding extraction, both via ONNX
//! Runtime, over RGB images decoded from disk.

pub mod alignment;
pub mod detector;
pub mod embedder;

pub use detector::{DetectError, Detection, DetectionModel, FaceDetector};
pub use embedder::{EmbedError, FaceEmbedder, EMBEDDING_DIM};

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use facesift_core::{DetectedFace, EmbeddingSource, FaceBox};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Model directory: `FACESIFT_MODEL_DIR` or `models/` relative to the
/// working directory.
pub fn default_model_dir() -> PathBuf {
    std::env::var("FACESIFT_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("models"))
}

/// Detects faces in an image file and extracts one embedding per face.
pub struct FaceScanner {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl FaceScanner {
    /// Load both ONNX models from `model_dir`. Fails fast when either
    /// model file is missing.
    pub fn new(model_dir: &Path, model: DetectionModel, upsample: u32) -> Result<Self, ScanError> {
        let detector = FaceDetector::load(&model_dir.join(model.file_name()), upsample)?;
        let embedder = FaceEmbedder::load(&model_dir.join(embedder::MODEL_FILE))?;
        Ok(Self { detector, embedder })
    }

    /// Decode an image and return one record per detected face. An empty
    /// vec means no face was found.
    pub fn scan_image(&mut self, path: &Path) -> Result<Vec<DetectedFace>, ScanError> {
        let image = image::open(path)?.to_rgb8();
        let detections = self.detector.detect(&image)?;

        let mut faces = Vec::with_capacity(detections.len());
        for det in &detections {
            let embedding = self.embedder.extract(&image, &det.landmarks)?;
            faces.push(DetectedFace {
                embedding,
                face_box: clamp_to_image(det, &image),
            });
        }

        tracing::debug!(path = %path.display(), faces = faces.len(), "scanned image");
        Ok(faces)
    }
}

impl EmbeddingSource for FaceScanner {
    fn scan(
        &mut self,
        image_path: &Path,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error + Send + Sync>> {
        self.scan_image(image_path).map_err(Into::into)
    }
}

/// Round the detection rectangle to pixel offsets inside the image grid.
fn clamp_to_image(det: &Detection, image: &RgbImage) -> FaceBox {
    let (width, height) = image.dimensions();
    let cx = |v: f32| v.round().clamp(0.0, width as f32) as i32;
    let cy = |v: f32| v.round().clamp(0.0, height as f32) as i32;
    FaceBox {
        top: cy(det.y1),
        right: cx(det.x2),
        bottom: cy(det.y2),
        left: cx(det.x1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
            landmarks: [(0.0, 0.0); 5],
        }
    }

    #[test]
    fn test_clamp_inside_image_rounds() {
        let img = RgbImage::new(200, 100);
        let b = clamp_to_image(&detection(10.4, 20.6, 90.5, 80.1), &img);
        assert_eq!(b.left, 10);
        assert_eq!(b.top, 21);
        assert_eq!(b.right, 91);
        assert_eq!(b.bottom, 80);
    }

    #[test]
    fn test_clamp_out_of_bounds_detection() {
        let img = RgbImage::new(100, 100);
        let b = clamp_to_image(&detection(-15.0, -3.0, 130.0, 120.0), &img);
        assert_eq!(b.left, 0);
        assert_eq!(b.top, 0);
        assert_eq!(b.right, 100);
        assert_eq!(b.bottom, 100);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 100);
    }

    #[test]
    fn test_default_model_dir_fallback() {
        // Without the env var set, the fallback is a relative models/ dir.
        if std::env::var("FACESIFT_MODEL_DIR").is_err() {
            assert_eq!(default_model_dir(), PathBuf::from("models"));
        }
    }
}
