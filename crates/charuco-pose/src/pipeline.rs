//! Per-frame detection and pose pipeline.
//!
//! Sequence:
//! 1. detect markers,
//! 2. refine them against the board layout (only with intrinsics),
//! 3. interpolate board corners when any marker was found,
//! 4. estimate the board pose (only with intrinsics),
//! 5. optionally render the overlay.
//!
//! No markers and no pose are reported as data (`pose_valid = false`), never
//! as errors.

use crate::backend::{BackendError, BoardCorners, FiducialBackend, MarkerDetections, Quad};
use crate::board::CharucoBoard;
use crate::draw;
use crate::params::DetectorParams;
use charuco_pose_core::{BoardPose, CameraIntrinsics, GrayImageView, ImageError};
use image::RgbImage;
use nalgebra::{Point2, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid input image: {0}")]
    InvalidInput(#[from] ImageError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Everything found in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    /// Unique per frame.
    pub marker_ids: Vec<i32>,
    pub marker_corners: Vec<Quad>,
    pub rejected_candidates: Vec<Quad>,
    /// Sorted ascending; parallel to `interpolated_board_corners`.
    pub interpolated_board_corner_ids: Vec<u32>,
    pub interpolated_board_corners: Vec<Point2<f64>>,
    pub pose_valid: bool,
    /// Axis-angle, zero unless `pose_valid`.
    pub rotation: Vector3<f64>,
    /// Meters, zero unless `pose_valid`.
    pub translation: Vector3<f64>,
    /// Annotated canvas, present when requested.
    pub visualization: Option<RgbImage>,
}

impl DetectionResult {
    pub fn pose(&self) -> Option<BoardPose> {
        self.pose_valid
            .then(|| BoardPose::new(self.rotation, self.translation))
    }
}

/// Board, detector thresholds and backend for one image stream.
#[derive(Clone, Debug)]
pub struct CharucoPipeline<B> {
    board: CharucoBoard,
    params: DetectorParams,
    backend: B,
}

impl<B: FiducialBackend> CharucoPipeline<B> {
    pub fn new(board: CharucoBoard, params: DetectorParams, backend: B) -> Self {
        Self {
            board,
            params,
            backend,
        }
    }

    pub fn board(&self) -> &CharucoBoard {
        &self.board
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run detection, interpolation and pose estimation on one grayscale frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, image, intrinsics),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect(
        &self,
        image: &GrayImageView<'_>,
        intrinsics: Option<&CameraIntrinsics>,
        want_visualization: bool,
    ) -> Result<DetectionResult, PipelineError> {
        image.validate()?;

        let mut markers = self.backend.detect_markers(image, &self.board, &self.params)?;
        let before = markers.ids.len();
        markers.dedup_ids();
        if markers.ids.len() != before {
            log::debug!("dropped {} duplicate marker ids", before - markers.ids.len());
        }

        if let Some(camera) = intrinsics {
            if !markers.is_empty() {
                self.backend
                    .refine_markers(image, &self.board, &mut markers, camera)?;
                markers.dedup_ids();
            }
        }

        let corners = if markers.is_empty() {
            log::debug!("no markers found");
            BoardCorners::default()
        } else {
            self.backend
                .interpolate_board_corners(image, &self.board, &markers, intrinsics)?
        };

        let pose = match intrinsics {
            Some(camera) if !corners.is_empty() => {
                self.backend
                    .estimate_board_pose(&self.board, &corners, camera)?
            }
            _ => None,
        };
        if pose.is_none() && !markers.is_empty() {
            log::debug!(
                "no pose from {} markers / {} corners",
                markers.ids.len(),
                corners.len()
            );
        }

        let visualization =
            want_visualization.then(|| self.render(image, &markers, &corners, intrinsics, pose.as_ref()));

        let MarkerDetections {
            ids,
            corners: marker_corners,
            rejected,
        } = markers;
        let (rotation, translation) = pose
            .map(|p| (p.rotation, p.translation))
            .unwrap_or_else(|| (Vector3::zeros(), Vector3::zeros()));

        Ok(DetectionResult {
            marker_ids: ids,
            marker_corners,
            rejected_candidates: rejected,
            interpolated_board_corner_ids: corners.ids,
            interpolated_board_corners: corners.corners,
            pose_valid: pose.is_some(),
            rotation,
            translation,
            visualization,
        })
    }

    fn render(
        &self,
        image: &GrayImageView<'_>,
        markers: &MarkerDetections,
        corners: &BoardCorners,
        intrinsics: Option<&CameraIntrinsics>,
        pose: Option<&BoardPose>,
    ) -> RgbImage {
        let mut canvas = draw::gray_to_canvas(image);
        draw::draw_markers(&mut canvas, markers);
        draw::draw_rejected(&mut canvas, &markers.rejected);
        draw::draw_board_corners(&mut canvas, corners);
        if let (Some(camera), Some(pose)) = (intrinsics, pose) {
            if !draw::draw_axes(&mut canvas, &self.board, camera, pose) {
                log::debug!("board axes do not project into the image");
            }
        }
        canvas
    }
}
