//! Recovery of board markers that the detector rejected.
//!
//! The board pose is solved from the markers that did decode; every board
//! marker still missing is projected into the image and matched against the
//! rejected candidate quads. A candidate whose corners lie within
//! `min_rep_distance` pixels (mean over the four corners) of a projection is
//! adopted under that marker's id.

use super::{MarkerDetections, Quad};
use crate::board::CharucoBoard;
use crate::params::RefineParams;
use charuco_pose_core::{solve_planar_pose, BoardPose, CameraIntrinsics, PoseSolveParams};
use nalgebra::{Point2, Point3};
use std::collections::HashSet;

/// Board-plane and image corners of every detected marker that belongs to the board.
pub(super) fn marker_correspondences(
    board: &CharucoBoard,
    detections: &MarkerDetections,
) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    let mut object = Vec::with_capacity(detections.ids.len() * 4);
    let mut image = Vec::with_capacity(detections.ids.len() * 4);
    for (&id, quad) in detections.ids.iter().zip(&detections.corners) {
        let Some(obj) = board.marker_object_corners(id) else {
            continue;
        };
        object.extend_from_slice(&obj);
        image.extend_from_slice(quad);
    }
    (object, image)
}

pub(super) fn project_quad(
    camera: &CameraIntrinsics,
    pose: &BoardPose,
    object: &[Point2<f64>; 4],
) -> Option<Quad> {
    let mut out = [Point2::origin(); 4];
    for (dst, o) in out.iter_mut().zip(object) {
        *dst = camera.project(&pose.transform_point(&Point3::new(o.x, o.y, 0.0)))?;
    }
    Some(out)
}

/// Mean corner distance of `candidate` to `target` over the best allowed rotation.
fn quad_distance(target: &Quad, candidate: &Quad, check_all_orders: bool) -> (f64, usize) {
    let rotations = if check_all_orders { 4 } else { 1 };
    (0..rotations)
        .map(|r| {
            let d = (0..4)
                .map(|k| (candidate[(k + r) % 4] - target[k]).norm())
                .sum::<f64>()
                / 4.0;
            (d, r)
        })
        .fold((f64::INFINITY, 0), |best, cur| if cur.0 < best.0 { cur } else { best })
}

/// Adopt rejected candidates matching projected board markers.
///
/// Returns the number of recovered markers.
pub(super) fn refine_detected_markers(
    board: &CharucoBoard,
    detections: &mut MarkerDetections,
    camera: &CameraIntrinsics,
    params: &RefineParams,
    pose_params: &PoseSolveParams,
) -> usize {
    if detections.ids.is_empty() || detections.rejected.is_empty() {
        return 0;
    }

    let (object, image) = marker_correspondences(board, detections);
    let Some(pose) = solve_planar_pose(&object, &image, camera, pose_params) else {
        log::debug!("marker refinement skipped: no pose from {} markers", detections.ids.len());
        return 0;
    };

    let present: HashSet<i32> = detections.ids.iter().copied().collect();
    let mut recovered = 0;
    for id in 0..board.marker_count() as i32 {
        if present.contains(&id) || detections.rejected.is_empty() {
            continue;
        }
        let Some(obj) = board.marker_object_corners(id) else {
            continue;
        };
        let Some(projected) = project_quad(camera, &pose, &obj) else {
            continue;
        };

        let best = detections
            .rejected
            .iter()
            .enumerate()
            .map(|(idx, cand)| {
                let (d, r) = quad_distance(&projected, cand, params.check_all_orders);
                (idx, d, r)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((idx, d, r)) = best {
            if d < params.min_rep_distance {
                let cand = detections.rejected.remove(idx);
                let quad = std::array::from_fn(|k| cand[(k + r) % 4]);
                detections.ids.push(id);
                detections.corners.push(quad);
                recovered += 1;
            }
        }
    }

    if recovered > 0 {
        log::debug!("recovered {recovered} markers from rejected candidates");
    }
    recovered
}
