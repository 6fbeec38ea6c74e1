//! SCRFD face detector for still photos via ONNX Runtime.
//!
//! Decodes the anchor-free SCRFD head at three stride levels, maps boxes
//! back through the letterbox resize into source-image coordinates, and
//! suppresses overlapping detections with NMS.

use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const BASE_INPUT_SIZE: usize = 640;
const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;
/// Each upsample step doubles the letterbox target, so 3 already means a
/// 5120px input. Anything above is clamped.
const MAX_UPSAMPLE: u32 = 3;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Which SCRFD variant to run. `Fast` (det_500m) is several times
/// cheaper per image; `Accurate` (det_10g) finds more small and
/// off-angle faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionModel {
    Fast,
    Accurate,
}

impl DetectionModel {
    pub fn file_name(self) -> &'static str {
        match self {
            DetectionModel::Fast => "det_500m.onnx",
            DetectionModel::Accurate => "det_10g.onnx",
        }
    }
}

/// One detected face in source-image pixel coordinates.
#[derive(Debug, Clone)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    /// Five-point landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: [(f32, f32); 5],
}

/// Maps letterboxed tensor coordinates back to the source image.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// SCRFD-based face detector for RGB images.
pub struct FaceDetector {
    session: Session,
    input_size: usize,
}

impl FaceDetector {
    /// Load an SCRFD model. `upsample` doubles the letterbox input size
    /// per step so smaller faces survive the downscale, at a latency cost.
    pub fn load(model_path: &Path, upsample: u32) -> Result<Self, DetectError> {
        if !model_path.exists() {
            return Err(DetectError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        if num_outputs < 9 {
            return Err(DetectError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides x score/bbox/kps), got {num_outputs}"
            )));
        }

        let upsample = if upsample > MAX_UPSAMPLE {
            tracing::warn!(requested = upsample, clamped = MAX_UPSAMPLE, "upsample clamped");
            MAX_UPSAMPLE
        } else {
            upsample
        };
        let input_size = BASE_INPUT_SIZE << upsample;

        tracing::info!(
            path = %model_path.display(),
            input_size,
            "loaded SCRFD model"
        );

        Ok(Self {
            session,
            input_size,
        })
    }

    /// Detect faces in an RGB image, most confident first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        let (input, letterbox) = self.preprocess(image);
        let input_size = self.input_size;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // SCRFD standard output ordering: [0-2] scores, [3-5] bboxes,
        // [6-8] kps, each for strides 8/16/32.
        let mut detections = Vec::new();
        for (pos, &stride) in STRIDES.iter().enumerate() {
            let (_, scores) = outputs[pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[pos + 3]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[pos + 6]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                input_size,
                &letterbox,
                &mut detections,
            );
        }

        let mut kept = nms(detections, NMS_IOU_THRESHOLD);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }

    /// Letterbox the image into a square NCHW tensor.
    ///
    /// Every tensor pixel is mapped back to source coordinates and sampled
    /// bilinearly; the padding band is filled with the mean so it
    /// normalizes to zero.
    fn preprocess(&self, image: &RgbImage) -> (Array4<f32>, Letterbox) {
        let (width, height) = image.dimensions();
        let size = self.input_size;

        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_w = (width as f32 * scale).round() as usize;
        let new_h = (height as f32 * scale).round() as usize;
        let pad_x = (size - new_w) as f32 / 2.0;
        let pad_y = (size - new_h) as f32 / 2.0;
        let x_start = pad_x.floor() as usize;
        let y_start = pad_y.floor() as usize;

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for ty in 0..size {
            for tx in 0..size {
                let inside = tx >= x_start && tx < x_start + new_w && ty >= y_start && ty < y_start + new_h;
                let rgb = if inside {
                    let sx = (tx as f32 - pad_x + 0.5) / scale - 0.5;
                    let sy = (ty as f32 - pad_y + 0.5) / scale - 0.5;
                    sample_bilinear(image, sx, sy)
                } else {
                    [INPUT_MEAN; 3]
                };
                for c in 0..3 {
                    tensor[[0, c, ty, tx]] = (rgb[c] - INPUT_MEAN) / INPUT_STD;
                }
            }
        }

        (tensor, Letterbox { scale, pad_x, pad_y })
    }

}

/// Decode one stride level of the SCRFD head into `out`.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    out: &mut Vec<Detection>,
) {
    let grid_w = input_size / stride;
    let grid_h = input_size / stride;
    let num_anchors = grid_w * grid_h * ANCHORS_PER_CELL;

    for idx in 0..num_anchors {
        let confidence = scores.get(idx).copied().unwrap_or(0.0);
        if confidence <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid_w) as f32 * stride as f32;
        let anchor_cy = (cell / grid_w) as f32 * stride as f32;

        // Box offsets are [left, top, right, bottom] distances from
        // the anchor center, in stride units.
        let b = idx * 4;
        if b + 3 >= bboxes.len() {
            continue;
        }
        let (x1, y1) = letterbox.to_source(
            anchor_cx - bboxes[b] * stride as f32,
            anchor_cy - bboxes[b + 1] * stride as f32,
        );
        let (x2, y2) = letterbox.to_source(
            anchor_cx + bboxes[b + 2] * stride as f32,
            anchor_cy + bboxes[b + 3] * stride as f32,
        );

        let k = idx * 10;
        if k + 9 >= kps.len() {
            continue;
        }
        let mut landmarks = [(0.0f32, 0.0f32); 5];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            *lm = letterbox.to_source(
                anchor_cx + kps[k + i * 2] * stride as f32,
                anchor_cy + kps[k + i * 2 + 1] * stride as f32,
            );
        }

        out.push(Detection {
            x1,
            y1,
            x2,
            y2,
            confidence,
            landmarks,
        });
    }
}

/// Bilinear sample at fractional coordinates, clamped to image bounds.
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let (width, height) = image.dimensions();
    let x0 = (x.floor() as i64).clamp(0, width as i64 - 1) as u32;
    let y0 = (y.floor() as i64).clamp(0, height as i64 - 1) as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = (x - x.floor()).clamp(0.0, 1.0);
    let fy = (y - y.floor()).clamp(0.0, 1.0);

    let mut rgb = [0.0f32; 3];
    let tl = image.get_pixel(x0, y0).0;
    let tr = image.get_pixel(x1, y0).0;
    let bl = image.get_pixel(x0, y1).0;
    let br = image.get_pixel(x1, y1).0;
    for c in 0..3 {
        rgb[c] = tl[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + tr[c] as f32 * fx * (1.0 - fy)
            + bl[c] as f32 * (1.0 - fx) * fy
            + br[c] as f32 * fx * fy;
    }
    rgb
}

/// Non-maximum suppression over raw detections.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if kept.iter().all(|k| iou(k, &det) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
