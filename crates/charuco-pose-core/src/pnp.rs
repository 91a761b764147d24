//! Pose of a planar target from 2D-3D correspondences.
//!
//! The solver initialises from the board-plane homography in normalized
//! camera coordinates and refines all six degrees of freedom with
//! Levenberg-Marquardt on the pixel reprojection error, including lens
//! distortion.

use crate::{estimate_homography, BoardPose, CameraIntrinsics};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3, Rotation3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Levenberg-Marquardt settings for the planar pose solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseSolveParams {
    pub max_iterations: usize,
    /// Stop once the relative cost decrease falls below this value.
    pub cost_tolerance: f64,
    pub initial_damping: f64,
    /// Relative step used for the finite-difference Jacobian.
    pub jacobian_step: f64,
}

impl Default for PoseSolveParams {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            cost_tolerance: 1e-12,
            initial_damping: 1e-3,
            jacobian_step: 1e-7,
        }
    }
}

/// True when the 2D points lie (numerically) on a single line.
pub fn are_collinear(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return true;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let (dx, dy) = (p.x - cx, p.y - cy);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let trace = sxx + syy;
    let det = sxx * syy - sxy * sxy;
    // Smallest eigenvalue of the 2x2 scatter matrix relative to the largest.
    let disc = ((trace * trace) / 4.0 - det).max(0.0).sqrt();
    let l_max = trace / 2.0 + disc;
    let l_min = trace / 2.0 - disc;
    l_max <= f64::EPSILON || l_min <= l_max * 1e-10
}

/// Root-mean-square pixel reprojection error of a pose.
pub fn reprojection_rms(
    object: &[Point2<f64>],
    image: &[Point2<f64>],
    camera: &CameraIntrinsics,
    pose: &BoardPose,
) -> Option<f64> {
    if object.is_empty() || object.len() != image.len() {
        return None;
    }
    let mut sum = 0.0;
    for (o, i) in object.iter().zip(image) {
        let p = pose.transform_point(&Point3::new(o.x, o.y, 0.0));
        let px = camera.project(&p)?;
        sum += (px - i).norm_squared();
    }
    Some((sum / object.len() as f64).sqrt())
}

/// Solve the pose of a planar target lying in the board's `z = 0` plane.
///
/// `object` holds board-plane coordinates (meters) and `image` the matching
/// pixel observations. Returns `None` for fewer than four points, collinear
/// layouts, or a degenerate solution.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(points = object.len()))
)]
pub fn solve_planar_pose(
    object: &[Point2<f64>],
    image: &[Point2<f64>],
    camera: &CameraIntrinsics,
    params: &PoseSolveParams,
) -> Option<BoardPose> {
    if object.len() != image.len() || object.len() < 4 || are_collinear(object) {
        return None;
    }

    let normalized: Vec<Point2<f64>> = image
        .iter()
        .map(|&p| camera.undistort_pixel(p))
        .collect::<Option<_>>()?;

    let initial = pose_from_homography(object, &normalized)?;
    let refined = refine_pose(object, image, camera, initial, params).unwrap_or(initial);

    let in_front = object.iter().all(|o| {
        refined
            .transform_point(&Point3::new(o.x, o.y, 0.0))
            .z
            > 0.0
    });
    (refined.is_finite() && in_front).then_some(refined)
}

/// Decompose `H ~ [r1 r2 t]` (board plane to normalized image) into a pose.
fn pose_from_homography(object: &[Point2<f64>], normalized: &[Point2<f64>]) -> Option<BoardPose> {
    let h = estimate_homography(object, normalized)?.h;
    let h1: Vector3<f64> = h.column(0).into_owned();
    let h2: Vector3<f64> = h.column(1).into_owned();
    let h3: Vector3<f64> = h.column(2).into_owned();

    let norm = 0.5 * (h1.norm() + h2.norm());
    if norm < f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / norm;
    // The board must sit in front of the camera.
    if h3[2] * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let t = h3 * lambda;

    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        for i in 0..3 {
            u_fixed[(i, 2)] = -u_fixed[(i, 2)];
        }
        r = u_fixed * v_t;
    }

    let rotation = Rotation3::from_matrix_unchecked(r);
    let pose = BoardPose::from_rotation(&rotation, t);
    pose.is_finite().then_some(pose)
}

fn residuals(
    object: &[Point2<f64>],
    image: &[Point2<f64>],
    camera: &CameraIntrinsics,
    x: &Vector6<f64>,
) -> Option<DVector<f64>> {
    let pose = BoardPose::new(
        x.fixed_rows::<3>(0).into_owned(),
        x.fixed_rows::<3>(3).into_owned(),
    );
    let mut r = DVector::zeros(2 * object.len());
    for (k, (o, i)) in object.iter().zip(image).enumerate() {
        let px = camera.project(&pose.transform_point(&Point3::new(o.x, o.y, 0.0)))?;
        r[2 * k] = px.x - i.x;
        r[2 * k + 1] = px.y - i.y;
    }
    Some(r)
}

fn refine_pose(
    object: &[Point2<f64>],
    image: &[Point2<f64>],
    camera: &CameraIntrinsics,
    initial: BoardPose,
    params: &PoseSolveParams,
) -> Option<BoardPose> {
    let mut x = Vector6::new(
        initial.rotation[0],
        initial.rotation[1],
        initial.rotation[2],
        initial.translation[0],
        initial.translation[1],
        initial.translation[2],
    );
    let mut r = residuals(object, image, camera, &x)?;
    let mut cost = r.norm_squared();
    let mut damping = params.initial_damping;

    for _ in 0..params.max_iterations {
        if cost <= f64::EPSILON {
            break;
        }

        let mut jac = DMatrix::<f64>::zeros(r.len(), 6);
        for c in 0..6 {
            let step = params.jacobian_step * x[c].abs().max(1.0);
            let mut xp = x;
            let mut xm = x;
            xp[c] += step;
            xm[c] -= step;
            let rp = residuals(object, image, camera, &xp)?;
            let rm = residuals(object, image, camera, &xm)?;
            jac.set_column(c, &((rp - rm) / (2.0 * step)));
        }

        let jtj = jac.transpose() * &jac;
        let neg_jtr = -(jac.transpose() * &r);

        let mut improved = false;
        for _ in 0..10 {
            let mut a = jtj.clone();
            for d in 0..6 {
                a[(d, d)] += damping * jtj[(d, d)].max(1e-12);
            }
            let Some(delta) = a.lu().solve(&neg_jtr) else {
                damping *= 10.0;
                continue;
            };
            let candidate = x + Vector6::from_iterator(delta.iter().copied());
            match residuals(object, image, camera, &candidate) {
                Some(rc) if rc.norm_squared() < cost => {
                    let new_cost = rc.norm_squared();
                    let rel = (cost - new_cost) / cost.max(f64::EPSILON);
                    x = candidate;
                    r = rc;
                    cost = new_cost;
                    damping = (damping * 0.1).max(1e-12);
                    improved = rel > params.cost_tolerance;
                    break;
                }
                _ => damping *= 10.0,
            }
        }
        if !improved {
            break;
        }
    }

    let pose = BoardPose::new(
        x.fixed_rows::<3>(0).into_owned(),
        x.fixed_rows::<3>(3).into_owned(),
    );
    pose.is_finite().then_some(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameHeader;

    fn camera(distortion: [f64; 5]) -> CameraIntrinsics {
        CameraIntrinsics::from_row_major(
            &[600.0, 0.0, 320.0, 0.0, 600.0, 240.0, 0.0, 0.0, 1.0],
            distortion,
            FrameHeader::default(),
        )
    }

    fn grid() -> Vec<Point2<f64>> {
        (1..5)
            .flat_map(|j| (1..6).map(move |i| Point2::new(i as f64 * 0.03, j as f64 * 0.03)))
            .collect()
    }

    fn observe(cam: &CameraIntrinsics, pose: &BoardPose, obj: &[Point2<f64>]) -> Vec<Point2<f64>> {
        obj.iter()
            .map(|o| {
                cam.project(&pose.transform_point(&Point3::new(o.x, o.y, 0.0)))
                    .expect("visible")
            })
            .collect()
    }

    #[test]
    fn recovers_pose_without_distortion() {
        let cam = camera([0.0; 5]);
        let truth = BoardPose::new(Vector3::new(0.2, -0.3, 0.1), Vector3::new(-0.08, -0.05, 0.6));
        let obj = grid();
        let img = observe(&cam, &truth, &obj);

        let pose = solve_planar_pose(&obj, &img, &cam, &PoseSolveParams::default()).expect("pose");
        assert!((pose.rotation - truth.rotation).norm() < 1e-6);
        assert!((pose.translation - truth.translation).norm() < 1e-6);
        assert!(reprojection_rms(&obj, &img, &cam, &pose).expect("rms") < 1e-6);
    }

    #[test]
    fn recovers_pose_with_distortion() {
        let cam = camera([-0.15, 0.03, 0.0005, -0.0003, 0.0]);
        let truth = BoardPose::new(Vector3::new(-0.25, 0.15, 1.2), Vector3::new(-0.02, -0.07, 0.5));
        let obj = grid();
        let img = observe(&cam, &truth, &obj);

        let pose = solve_planar_pose(&obj, &img, &cam, &PoseSolveParams::default()).expect("pose");
        assert!((pose.rotation - truth.rotation).norm() < 1e-5);
        assert!((pose.translation - truth.translation).norm() < 1e-5);
    }

    #[test]
    fn collinear_or_sparse_points_have_no_pose() {
        let cam = camera([0.0; 5]);
        let line: Vec<Point2<f64>> = (0..6).map(|i| Point2::new(i as f64 * 0.03, 0.03)).collect();
        let img: Vec<Point2<f64>> = line
            .iter()
            .map(|p| Point2::new(300.0 + p.x * 1000.0, 200.0))
            .collect();
        assert!(are_collinear(&line));
        assert!(solve_planar_pose(&line, &img, &cam, &PoseSolveParams::default()).is_none());
        assert!(solve_planar_pose(&line[..3], &img[..3], &cam, &PoseSolveParams::default()).is_none());
    }
}
