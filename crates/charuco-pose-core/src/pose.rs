use nalgebra::{Point3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Board pose in the camera frame as an axis-angle rotation plus translation.
///
/// Maps board-frame points into the camera frame: `p_cam = R(rotation) * p_board + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardPose {
    /// Rotation vector (axis * angle, radians).
    pub rotation: Vector3<f64>,
    /// Translation in meters.
    pub translation: Vector3<f64>,
}

impl BoardPose {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn from_rotation(rotation: &Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self::new(rotation.scaled_axis(), translation)
    }

    #[inline]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation)
    }

    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation_matrix() * p + self.translation
    }

    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite())
    }
}

/// Position + unit quaternion orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Meters, camera frame.
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    /// Orientation as `[x, y, z, w]`.
    pub fn orientation_xyzw(&self) -> [f64; 4] {
        let q = self.orientation.quaternion();
        [q.i, q.j, q.k, q.w]
    }
}

/// Convert an axis-angle rotation and a translation into a quaternion pose.
///
/// The rotation vector goes through a rotation matrix before the quaternion
/// conversion; the result is renormalized so its norm is 1 to machine precision.
pub fn encode_pose(rotation: &Vector3<f64>, translation: &Vector3<f64>) -> Pose {
    let matrix = Rotation3::new(*rotation);
    let q: Quaternion<f64> = UnitQuaternion::from_rotation_matrix(&matrix).into_inner();
    Pose {
        position: *translation,
        orientation: UnitQuaternion::new_normalize(q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn zero_rotation_is_identity_quaternion() {
        let pose = encode_pose(&Vector3::zeros(), &Vector3::new(0.1, -0.2, 1.5));
        assert_eq!(pose.orientation_xyzw(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(pose.position, Vector3::new(0.1, -0.2, 1.5));
    }

    #[test]
    fn quarter_turn_about_z() {
        let pose = encode_pose(&Vector3::new(0.0, 0.0, FRAC_PI_2), &Vector3::zeros());
        let [x, y, z, w] = pose.orientation_xyzw();
        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(z.abs(), h, epsilon = 1e-12);
        assert_relative_eq!(w.abs(), h, epsilon = 1e-12);
    }

    #[test]
    fn quaternion_is_unit_for_assorted_rotations() {
        for (i, axis) in [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.3, -0.4, 0.866),
            Vector3::new(-2.0, 1.0, 0.5),
        ]
        .iter()
        .enumerate()
        {
            for angle in [1e-9, 0.3, 1.7, 3.1] {
                let rvec = axis.normalize() * angle * (1.0 + i as f64 * 1e-3);
                let pose = encode_pose(&rvec, &Vector3::zeros());
                let n = pose.orientation.quaternion().norm();
                assert!((n - 1.0).abs() < 1e-6, "norm {n} for {rvec:?}");
                assert_relative_eq!(pose.orientation.angle(), rvec.norm(), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn board_pose_transforms_points() {
        let pose = BoardPose::new(Vector3::new(0.0, 0.0, FRAC_PI_2), Vector3::new(0.0, 0.0, 1.0));
        let p = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 1.0, 1.0), epsilon = 1e-12);
    }
}
