//! Pinhole camera with radial/tangential lens distortion.
//!
//! Distortion coefficients follow the `[k1, k2, p1, p2, k3]` convention:
//!
//! ```text
//! r2 = x^2 + y^2
//! x' = x (1 + k1 r2 + k2 r2^2 + k3 r2^3) + 2 p1 x y + p2 (r2 + 2 x^2)
//! y' = y (1 + k1 r2 + k2 r2^2 + k3 r2^3) + p1 (r2 + 2 y^2) + 2 p2 x y
//! ```

use crate::FrameHeader;
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Number of distortion coefficients carried by [`CameraIntrinsics`].
pub const DISTORTION_COEFFS: usize = 5;

const UNDISTORT_ITERATIONS: usize = 20;

/// Validated camera intrinsics snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// 3x3 intrinsic matrix (focal lengths, skew, principal point).
    pub matrix: Matrix3<f64>,
    /// `[k1, k2, p1, p2, k3]`.
    pub distortion: [f64; DISTORTION_COEFFS],
    /// Header of the calibration message this snapshot was built from.
    #[serde(default)]
    pub provenance: FrameHeader,
}

impl CameraIntrinsics {
    /// Build from a row-major intrinsic array.
    pub fn from_row_major(
        k: &[f64; 9],
        distortion: [f64; DISTORTION_COEFFS],
        provenance: FrameHeader,
    ) -> Self {
        Self {
            matrix: Matrix3::from_row_slice(k),
            distortion,
            provenance,
        }
    }

    /// Row-major copy of the intrinsic matrix.
    pub fn row_major(&self) -> [f64; 9] {
        let m = &self.matrix;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    /// True if any entry of the intrinsic matrix is non-zero.
    pub fn has_nonzero_matrix(k: &[f64; 9]) -> bool {
        k.iter().any(|&v| v != 0.0)
    }

    #[inline]
    pub fn has_distortion(&self) -> bool {
        self.distortion.iter().any(|&d| d != 0.0)
    }

    /// Apply the distortion model to ideal normalized coordinates.
    pub fn distort_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        Point2::new(
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }

    /// Map distorted normalized coordinates to pixels through the intrinsic matrix.
    #[inline]
    pub fn normalized_to_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    /// Project a camera-frame point to pixels. Points at or behind the camera yield `None`.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        let ideal = Point2::new(p.x / p.z, p.y / p.z);
        let px = self.normalized_to_pixel(self.distort_normalized(ideal));
        (px.x.is_finite() && px.y.is_finite()).then_some(px)
    }

    /// Invert the intrinsic matrix and the distortion model for a pixel.
    ///
    /// Distortion is removed by fixed-point iteration, which converges for
    /// the moderate distortion of typical lenses.
    pub fn undistort_pixel(&self, px: Point2<f64>) -> Option<Point2<f64>> {
        let k_inv = self.matrix.try_inverse()?;
        let v = k_inv * Vector3::new(px.x, px.y, 1.0);
        if v[2].abs() < f64::EPSILON {
            return None;
        }
        let distorted = Point2::new(v[0] / v[2], v[1] / v[2]);
        if !self.has_distortion() {
            return Some(distorted);
        }

        let [k1, k2, p1, p2, k3] = self.distortion;
        let (mut x, mut y) = (distorted.x, distorted.y);
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
            if radial.abs() < f64::EPSILON {
                return None;
            }
            let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            x = (distorted.x - dx) / radial;
            y = (distorted.y - dy) / radial;
        }
        (x.is_finite() && y.is_finite()).then(|| Point2::new(x, y))
    }
}
