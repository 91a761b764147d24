//! Geometric building blocks for ChArUco board pose estimation.
//!
//! This crate is intentionally small and free of any detector or transport
//! knowledge. It provides:
//! - borrowed grayscale image views with bilinear sampling,
//! - DLT homography estimation,
//! - a pinhole camera with the 5-coefficient radial/tangential distortion model,
//! - a planar pose solver (homography initialisation + Levenberg-Marquardt),
//! - conversion of axis-angle poses into quaternion poses.

mod camera;
mod header;
mod homography;
mod image;
mod pnp;
mod pose;

pub use camera::{CameraIntrinsics, DISTORTION_COEFFS};
pub use header::FrameHeader;
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{sample_bilinear, GrayImage, GrayImageView, ImageError};
pub use pnp::{are_collinear, reprojection_rms, solve_planar_pose, PoseSolveParams};
pub use pose::{encode_pose, BoardPose, Pose};
