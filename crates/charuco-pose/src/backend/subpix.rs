//! Gradient-based sub-pixel corner refinement.
//!
//! For a true corner `q`, every image gradient `g(p)` in a window around it is
//! orthogonal to `p - q`. Summing `g gᵀ (p - q) = 0` over the window gives a
//! 2x2 linear system for `q`, which is re-solved around the new estimate until
//! the update becomes small.

use charuco_pose_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refinement window and stopping criteria.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubpixParams {
    /// Window spans `[-half_window, half_window]` pixels in both axes.
    pub half_window: usize,
    pub max_iterations: usize,
    /// Stop when an update moves the estimate less than this many pixels.
    pub epsilon: f64,
}

impl Default for SubpixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 100,
            epsilon: 0.01,
        }
    }
}

/// Refine `seed` towards the nearest chessboard-style corner.
///
/// Returns `seed` unchanged when the window carries no usable gradient
/// structure or when the estimate leaves the window.
pub fn refine_corner_subpix(
    image: &GrayImageView<'_>,
    seed: Point2<f64>,
    params: &SubpixParams,
) -> Point2<f64> {
    let half = params.half_window.max(1) as i64;
    // Gaussian weights, sigma = half window.
    let inv_two_sigma2 = 1.0 / (2.0 * (half * half) as f64);

    let mut q = seed;
    for _ in 0..params.max_iterations.max(1) {
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();

        for dy in -half..=half {
            for dx in -half..=half {
                let px = q.x + dx as f64;
                let py = q.y + dy as f64;
                let gx = 0.5 * (sample_bilinear(image, px + 1.0, py) - sample_bilinear(image, px - 1.0, py));
                let gy = 0.5 * (sample_bilinear(image, px, py + 1.0) - sample_bilinear(image, px, py - 1.0));
                let w = (-((dx * dx + dy * dy) as f64) * inv_two_sigma2).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b[0] += gxx * px + gxy * py;
                b[1] += gxy * px + gyy * py;
            }
        }

        let trace = a[(0, 0)] + a[(1, 1)];
        if trace <= f64::EPSILON || a.determinant().abs() <= 1e-9 * trace * trace {
            return seed;
        }
        let Some(inv) = a.try_inverse() else {
            return seed;
        };
        let next = inv * b;
        let next = Point2::new(next[0], next[1]);
        let step = (next - q).norm();
        q = next;
        if step < params.epsilon {
            break;
        }
    }

    if !q.x.is_finite() || !q.y.is_finite() || (q - seed).amax() > half as f64 {
        return seed;
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use charuco_pose_core::GrayImage;

    /// 40x40 image with dark top-left/bottom-right quadrants; the intensity
    /// step sits between pixels 19 and 20 in both axes.
    fn quadrant_image() -> GrayImage {
        let mut img = GrayImage::new(40, 40, 0);
        for y in 0..40 {
            for x in 0..40 {
                let dark = (x < 20) == (y < 20);
                img.data[y * 40 + x] = if dark { 20 } else { 230 };
            }
        }
        img
    }

    #[test]
    fn converges_to_quadrant_corner() {
        let img = quadrant_image();
        let refined = refine_corner_subpix(&img.view(), Point2::new(17.2, 21.6), &SubpixParams::default());
        assert!((refined.x - 19.5).abs() < 0.5, "x = {}", refined.x);
        assert!((refined.y - 19.5).abs() < 0.5, "y = {}", refined.y);
    }

    #[test]
    fn flat_image_keeps_seed() {
        let img = GrayImage::new(30, 30, 128);
        let seed = Point2::new(12.3, 14.7);
        assert_eq!(refine_corner_subpix(&img.view(), seed, &SubpixParams::default()), seed);
    }

    #[test]
    fn single_edge_is_degenerate() {
        let mut img = GrayImage::new(30, 30, 40);
        for y in 0..30 {
            for x in 15..30 {
                img.data[y * 30 + x] = 200;
            }
        }
        let seed = Point2::new(14.0, 15.0);
        assert_eq!(refine_corner_subpix(&img.view(), seed, &SubpixParams::default()), seed);
    }
}
