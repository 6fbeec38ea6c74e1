//! Face alignment via a 4-DOF similarity transform.
//!
//! ArcFace expects its input face in a canonical 112x112 pose. The five
//! detected landmarks are fit to the InsightFace reference positions by
//! least squares, and the image is warped through the inverse transform.

use image::{Rgb, RgbImage};

/// InsightFace reference landmarks for a 112x112 aligned crop:
/// left eye, right eye, nose, left mouth, right mouth.
const REFERENCE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

pub const ALIGNED_SIZE: u32 = 112;

/// Warp a face into a canonical 112x112 RGB crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let m = similarity_transform(landmarks, &REFERENCE_LANDMARKS);
    warp(image, &m)
}

/// Least-squares 4-DOF similarity transform (scale, rotation,
/// translation) mapping `src` onto `dst`.
///
/// Returns `[a, -b, tx, b, a, ty]` for the matrix
/// `[[a, -b, tx], [b, a, ty]]`.
fn similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Each point pair contributes two equations in (a, b, tx, ty):
    //   sx*a - sy*b + tx = dx
    //   sy*a + sx*b + ty = dy
    // Accumulate the normal equations A^T A x = A^T d and solve.
    let mut ata = [[0.0f32; 4]; 4];
    let mut atd = [0.0f32; 4];

    for ((sx, sy), (dx, dy)) in src.iter().zip(dst.iter()) {
        let rows = [
            ([*sx, -*sy, 1.0, 0.0], *dx),
            ([*sy, *sx, 0.0, 1.0], *dy),
        ];
        for (row, rhs) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += row[j] * row[k];
                }
                atd[j] += row[j] * rhs;
            }
        }
    }

    let [a, b, tx, ty] = solve_normal_equations(&ata, &atd);
    [a, -b, tx, b, a, ty]
}

/// Gaussian elimination with partial pivoting on the 4x4 system.
fn solve_normal_equations(ata: &[[f32; 4]; 4], atd: &[f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        m[i][..4].copy_from_slice(&ata[i]);
        m[i][4] = atd[i];
    }

    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&r, &s| {
                m[r][col]
                    .abs()
                    .partial_cmp(&m[s][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            // Degenerate landmark layout; fall back to identity scale.
            return [1.0, 0.0, 0.0, 0.0];
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Apply the similarity warp, bilinear-sampled, black outside the source.
fn warp(image: &RgbImage, matrix: &[f32; 6]) -> RgbImage {
    let (a, tx, b, ty) = (matrix[0], matrix[2], matrix[3], matrix[5]);
    let (width, height) = image.dimensions();

    // Inverse of the 2x2 rotation-scale block [[a, -b], [b, a]].
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
    }
    let (ia, ib) = (a / det, b / det);

    RgbImage::from_fn(ALIGNED_SIZE, ALIGNED_SIZE, |ox, oy| {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;

        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let sample = |x: i64, y: i64| -> [f32; 3] {
            if x >= 0 && x < width as i64 && y >= 0 && y < height as i64 {
                let p = image.get_pixel(x as u32, y as u32).0;
                [p[0] as f32, p[1] as f32, p[2] as f32]
            } else {
                [0.0; 3]
            }
        };

        let tl = sample(x0, y0);
        let tr = sample(x0 + 1, y0);
        let bl = sample(x0, y0 + 1);
        let br = sample(x0 + 1, y0 + 1);

        let mut px = [0u8; 3];
        for c in 0..3 {
            let val = tl[c] * (1.0 - fx) * (1.0 - fy)
                + tr[c] * fx * (1.0 - fy)
                + bl[c] * (1.0 - fx) * fy
                + br[c] * fx * fy;
            px[c] = val.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(px)
    })
}
