//! Fiducial backend boundary.
//!
//! The pipeline talks to marker detection, marker refinement, board corner
//! interpolation and pose estimation only through [`FiducialBackend`]. The
//! crate ships [`NativeBackend`], which implements everything except raw
//! marker candidate detection on top of a pluggable [`MarkerDetector`].

mod interpolate;
mod native;
mod refine;
mod subpix;

pub use native::NativeBackend;
pub use subpix::{refine_corner_subpix, SubpixParams};

use crate::board::CharucoBoard;
use crate::dictionary::DictionarySpec;
use crate::params::DetectorParams;
use charuco_pose_core::{BoardPose, CameraIntrinsics, GrayImageView, ImageError};
use nalgebra::Point2;
use std::collections::HashSet;

/// Four image corners of a marker or candidate, in detector order.
pub type Quad = [Point2<f64>; 4];

/// Output of a marker detection pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerDetections {
    pub ids: Vec<i32>,
    /// One quad per id, same order.
    pub corners: Vec<Quad>,
    /// Quads that looked like markers but did not decode.
    pub rejected: Vec<Quad>,
}

impl MarkerDetections {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop repeated ids, keeping the first occurrence.
    pub fn dedup_ids(&mut self) {
        let mut seen = HashSet::with_capacity(self.ids.len());
        let (ids, corners) = self
            .ids
            .iter()
            .copied()
            .zip(self.corners.iter().copied())
            .filter(|(id, _)| seen.insert(*id))
            .unzip();
        self.ids = ids;
        self.corners = corners;
    }
}

/// Interpolated chessboard corners, sorted by corner id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoardCorners {
    pub ids: Vec<u32>,
    pub corners: Vec<Point2<f64>>,
}

impl BoardCorners {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Failure inside a backend call.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("marker detection failed: {0}")]
    Detection(String),
    #[error("dictionary {0:?} is not supported by this detector")]
    UnsupportedDictionary(DictionarySpec),
    #[error("detector returned {ids} ids but {corners} corner quads")]
    MismatchedDetections { ids: usize, corners: usize },
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Raw marker candidate detection and decoding.
pub trait MarkerDetector {
    fn detect(
        &self,
        image: &GrayImageView<'_>,
        dictionary: &DictionarySpec,
        params: &DetectorParams,
    ) -> Result<MarkerDetections, BackendError>;
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for &T {
    fn detect(
        &self,
        image: &GrayImageView<'_>,
        dictionary: &DictionarySpec,
        params: &DetectorParams,
    ) -> Result<MarkerDetections, BackendError> {
        (**self).detect(image, dictionary, params)
    }
}

/// The four capabilities the detection pipeline sequences.
pub trait FiducialBackend {
    /// Find and decode markers of the board's dictionary.
    fn detect_markers(
        &self,
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
        params: &DetectorParams,
    ) -> Result<MarkerDetections, BackendError>;

    /// Recover board markers missed by detection from the rejected candidates.
    fn refine_markers(
        &self,
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
        detections: &mut MarkerDetections,
        camera: &CameraIntrinsics,
    ) -> Result<(), BackendError>;

    /// Locate chessboard corners from the detected markers.
    fn interpolate_board_corners(
        &self,
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
        detections: &MarkerDetections,
        camera: Option<&CameraIntrinsics>,
    ) -> Result<BoardCorners, BackendError>;

    /// Board pose from interpolated corners; `Ok(None)` when not recoverable.
    fn estimate_board_pose(
        &self,
        board: &CharucoBoard,
        corners: &BoardCorners,
        camera: &CameraIntrinsics,
    ) -> Result<Option<BoardPose>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(v: f64) -> Quad {
        [Point2::new(v, v); 4]
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut det = MarkerDetections {
            ids: vec![3, 1, 3, 2, 1],
            corners: vec![quad(0.0), quad(1.0), quad(2.0), quad(3.0), quad(4.0)],
            rejected: vec![quad(9.0)],
        };
        det.dedup_ids();
        assert_eq!(det.ids, vec![3, 1, 2]);
        assert_eq!(det.corners, vec![quad(0.0), quad(1.0), quad(3.0)]);
        assert_eq!(det.rejected.len(), 1);
    }
}
