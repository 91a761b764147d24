//! Board corner interpolation from detected markers.
//!
//! ## Prediction
//!
//! - With intrinsics: an approximate board pose is solved from all marker
//!   corners and every inner corner is projected through it (lens distortion
//!   included).
//! - Without intrinsics, or when that pose cannot be solved: each detected
//!   marker contributes a local board-to-image homography from its four
//!   corners, and a corner's prediction is the mean over its adjacent markers.
//!
//! ## Selection and refinement
//!
//! A corner is kept only when at least `min_markers` of its adjacent markers
//! were detected. Kept corners are refined on the grayscale image with
//! [`refine_corner_subpix`](super::refine_corner_subpix); the window scales
//! with the apparent square size unless fixed in the parameters.

use super::refine::marker_correspondences;
use super::subpix::{refine_corner_subpix, SubpixParams};
use super::{BoardCorners, MarkerDetections, Quad};
use crate::board::CharucoBoard;
use crate::params::InterpolationParams;
use charuco_pose_core::{
    homography_from_4pt, solve_planar_pose, BoardPose, CameraIntrinsics, GrayImageView, Homography,
    PoseSolveParams,
};
use nalgebra::{Point2, Point3};
use std::collections::HashMap;

const MIN_HALF_WINDOW: f64 = 2.0;
const MAX_HALF_WINDOW: f64 = 10.0;

struct DetectedMarker<'a> {
    quad: &'a Quad,
    homography: Option<Homography>,
}

pub(super) fn interpolate_corners(
    image: &GrayImageView<'_>,
    board: &CharucoBoard,
    detections: &MarkerDetections,
    camera: Option<&CameraIntrinsics>,
    params: &InterpolationParams,
    pose_params: &PoseSolveParams,
) -> BoardCorners {
    let mut markers: HashMap<u32, DetectedMarker<'_>> = HashMap::new();
    for (&id, quad) in detections.ids.iter().zip(&detections.corners) {
        let Some(obj) = board.marker_object_corners(id) else {
            continue;
        };
        markers.insert(
            id as u32,
            DetectedMarker {
                quad,
                homography: homography_from_4pt(&obj, quad),
            },
        );
    }
    if markers.is_empty() {
        return BoardCorners::default();
    }

    let pose = camera.and_then(|cam| {
        let (object, img) = marker_correspondences(board, detections);
        solve_planar_pose(&object, &img, cam, pose_params).map(|pose| (cam, pose))
    });

    let ratio = board.spec().square_size_m / board.spec().marker_size_m;
    let mut out = BoardCorners::default();
    for corner_id in 0..board.corner_count() as u32 {
        let adjacent: Vec<&DetectedMarker<'_>> = board
            .adjacent_markers(corner_id)
            .iter()
            .filter_map(|m| markers.get(m))
            .collect();
        if adjacent.is_empty() || adjacent.len() < params.min_markers {
            continue;
        }
        let Some(object) = board.corner_object_xy(corner_id) else {
            continue;
        };

        let predicted = pose
            .and_then(|(cam, board_pose)| project_corner(cam, &board_pose, object))
            .or_else(|| mean_local_prediction(&adjacent, object));
        let Some(predicted) = predicted else {
            continue;
        };
        if !image.contains(predicted.x, predicted.y) {
            continue;
        }

        let subpix = SubpixParams {
            half_window: half_window(params, &adjacent, ratio),
            max_iterations: params.subpix_max_iterations,
            epsilon: params.subpix_epsilon,
        };
        out.ids.push(corner_id);
        out.corners.push(refine_corner_subpix(image, predicted, &subpix));
    }
    out
}

fn project_corner(
    camera: &CameraIntrinsics,
    pose: &BoardPose,
    object: Point2<f64>,
) -> Option<Point2<f64>> {
    camera.project(&pose.transform_point(&Point3::new(object.x, object.y, 0.0)))
}

fn mean_local_prediction(adjacent: &[&DetectedMarker<'_>], object: Point2<f64>) -> Option<Point2<f64>> {
    let predictions: Vec<Point2<f64>> = adjacent
        .iter()
        .filter_map(|m| m.homography.as_ref())
        .map(|h| h.apply(object))
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    if predictions.is_empty() {
        return None;
    }
    let n = predictions.len() as f64;
    let (sx, sy) = predictions
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    Some(Point2::new(sx / n, sy / n))
}

fn half_window(params: &InterpolationParams, adjacent: &[&DetectedMarker<'_>], ratio: f64) -> usize {
    if params.subpix_half_window > 0 {
        return params.subpix_half_window;
    }
    let side = adjacent
        .iter()
        .map(|m| {
            let q = m.quad;
            (0..4).map(|k| (q[(k + 1) % 4] - q[k]).norm()).sum::<f64>() / 4.0
        })
        .sum::<f64>()
        / adjacent.len() as f64;
    // Quarter of the apparent square side.
    (0.25 * side * ratio).clamp(MIN_HALF_WINDOW, MAX_HALF_WINDOW) as usize
}
