use super::interpolate::interpolate_corners;
use super::refine::refine_detected_markers;
use super::{BackendError, BoardCorners, FiducialBackend, MarkerDetections, MarkerDetector};
use crate::board::CharucoBoard;
use crate::params::{DetectorParams, InterpolationParams, RefineParams};
use charuco_pose_core::{
    solve_planar_pose, BoardPose, CameraIntrinsics, GrayImageView, PoseSolveParams,
};

/// Backend that delegates candidate detection to a [`MarkerDetector`] and
/// performs refinement, corner interpolation and pose estimation itself.
#[derive(Clone, Debug)]
pub struct NativeBackend<D> {
    detector: D,
    pub refine: RefineParams,
    pub interpolation: InterpolationParams,
    pub pose: PoseSolveParams,
}

impl<D: MarkerDetector> NativeBackend<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            refine: RefineParams::default(),
            interpolation: InterpolationParams::default(),
            pose: PoseSolveParams::default(),
        }
    }

    pub fn with_params(
        detector: D,
        refine: RefineParams,
        interpolation: InterpolationParams,
        pose: PoseSolveParams,
    ) -> Self {
        Self {
            detector,
            refine,
            interpolation,
            pose,
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }
}

impl<D: MarkerDetector> FiducialBackend for NativeBackend<D> {
    fn detect_markers(
        &self,
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
        params: &DetectorParams,
    ) -> Result<MarkerDetections, BackendError> {
        image.validate()?;
        let detections = self.detector.detect(image, &board.spec().dictionary, params)?;
        if detections.ids.len() != detections.corners.len() {
            return Err(BackendError::MismatchedDetections {
                ids: detections.ids.len(),
                corners: detections.corners.len(),
            });
        }
        Ok(detections)
    }

    fn refine_markers(
        &self,
        _image: &GrayImageView<'_>,
        board: &CharucoBoard,
        detections: &mut MarkerDetections,
        camera: &CameraIntrinsics,
    ) -> Result<(), BackendError> {
        refine_detected_markers(board, detections, camera, &self.refine, &self.pose);
        Ok(())
    }

    fn interpolate_board_corners(
        &self,
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
        detections: &MarkerDetections,
        camera: Option<&CameraIntrinsics>,
    ) -> Result<BoardCorners, BackendError> {
        image.validate()?;
        Ok(interpolate_corners(
            image,
            board,
            detections,
            camera,
            &self.interpolation,
            &self.pose,
        ))
    }

    fn estimate_board_pose(
        &self,
        board: &CharucoBoard,
        corners: &BoardCorners,
        camera: &CameraIntrinsics,
    ) -> Result<Option<BoardPose>, BackendError> {
        let mut object = Vec::with_capacity(corners.len());
        let mut image = Vec::with_capacity(corners.len());
        for (&id, &px) in corners.ids.iter().zip(&corners.corners) {
            if let Some(xy) = board.corner_object_xy(id) {
                object.push(xy);
                image.push(px);
            }
        }
        Ok(solve_planar_pose(&object, &image, camera, &self.pose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardSpec;
    use crate::dictionary::{DictionarySpec, PredefinedDictionary};
    use charuco_pose_core::{FrameHeader, GrayImage};
    use nalgebra::{Point2, Point3, Vector3};

    struct Fixed(MarkerDetections);

    impl MarkerDetector for Fixed {
        fn detect(
            &self,
            _image: &GrayImageView<'_>,
            _dictionary: &DictionarySpec,
            _params: &DetectorParams,
        ) -> Result<MarkerDetections, BackendError> {
            Ok(self.0.clone())
        }
    }

    fn board() -> CharucoBoard {
        CharucoBoard::new(BoardSpec {
            squares_x: 5,
            squares_y: 4,
            square_size_m: 0.04,
            marker_size_m: 0.03,
            dictionary: DictionarySpec::Predefined(PredefinedDictionary::Dict4x4_50),
        })
        .expect("board")
    }

    fn camera() -> CameraIntrinsics {
        CameraIntrinsics::from_row_major(
            &[800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0],
            [0.0; 5],
            FrameHeader::default(),
        )
    }

    fn truth() -> BoardPose {
        BoardPose::new(Vector3::new(0.1, -0.15, 0.05), Vector3::new(-0.1, -0.08, 0.6))
    }

    fn observe(board: &CharucoBoard, ids: &[i32]) -> MarkerDetections {
        let cam = camera();
        let pose = truth();
        let mut det = MarkerDetections::default();
        for &id in ids {
            let obj = board.marker_object_corners(id).expect("marker");
            let quad = std::array::from_fn(|k| {
                cam.project(&pose.transform_point(&Point3::new(obj[k].x, obj[k].y, 0.0)))
                    .expect("visible")
            });
            det.ids.push(id);
            det.corners.push(quad);
        }
        det
    }

    #[test]
    fn mismatched_detector_output_is_an_error() {
        let mut det = observe(&board(), &[0, 1]);
        det.corners.pop();
        let backend = NativeBackend::new(Fixed(det));
        let img = GrayImage::new(640, 480, 128);
        let err = backend
            .detect_markers(&img.view(), &board(), &DetectorParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::MismatchedDetections { ids: 2, corners: 1 }
        ));
    }

    #[test]
    fn refinement_adopts_rotated_rejected_candidate() {
        let board = board();
        let all = observe(&board, &(0..board.marker_count() as i32).collect::<Vec<_>>());
        let mut det = observe(&board, &[0, 1, 2, 3, 4, 5]);
        let missing = all.corners[7];
        det.rejected.push([missing[2], missing[3], missing[0], missing[1]]);
        det.rejected.push([Point2::new(5.0, 5.0); 4]);

        let backend = NativeBackend::new(Fixed(MarkerDetections::default()));
        let img = GrayImage::new(640, 480, 128);
        backend
            .refine_markers(&img.view(), &board, &mut det, &camera())
            .expect("refine");

        assert_eq!(det.ids.last(), Some(&7));
        let adopted = det.corners.last().expect("adopted quad");
        for k in 0..4 {
            assert!((adopted[k] - missing[k]).norm() < 1e-6);
        }
        assert_eq!(det.rejected.len(), 1);
    }

    #[test]
    fn corners_need_both_adjacent_markers() {
        let board = board();
        // Markers 5 and 8 share corner 0 (cells (0,1) and (1,0)).
        let det = observe(&board, &[5, 8]);
        let backend = NativeBackend::new(Fixed(MarkerDetections::default()));
        let img = GrayImage::new(640, 480, 128);
        let corners = backend
            .interpolate_board_corners(&img.view(), &board, &det, None)
            .expect("interpolate");
        assert_eq!(corners.ids, vec![0]);

        let cam = camera();
        let obj = board.corner_object_xy(0).expect("corner");
        let expected = cam
            .project(&truth().transform_point(&Point3::new(obj.x, obj.y, 0.0)))
            .expect("visible");
        assert!((corners.corners[0] - expected).norm() < 1e-6);
    }

    #[test]
    fn pose_from_interpolated_corners() {
        let board = board();
        let det = observe(&board, &(0..board.marker_count() as i32).collect::<Vec<_>>());
        let backend = NativeBackend::new(Fixed(MarkerDetections::default()));
        let img = GrayImage::new(640, 480, 128);
        let cam = camera();
        let corners = backend
            .interpolate_board_corners(&img.view(), &board, &det, Some(&cam))
            .expect("interpolate");
        assert_eq!(corners.len(), board.corner_count());

        let pose = backend
            .estimate_board_pose(&board, &corners, &cam)
            .expect("backend")
            .expect("pose");
        assert!((pose.rotation - truth().rotation).norm() < 1e-6);
        assert!((pose.translation - truth().translation).norm() < 1e-6);
    }

    #[test]
    fn too_few_corners_give_no_pose() {
        let board = board();
        let corners = BoardCorners {
            ids: vec![0, 1, 2],
            corners: vec![
                Point2::new(100.0, 100.0),
                Point2::new(150.0, 100.0),
                Point2::new(200.0, 100.0),
            ],
        };
        let backend = NativeBackend::new(Fixed(MarkerDetections::default()));
        let pose = backend
            .estimate_board_pose(&board, &corners, &camera())
            .expect("backend");
        assert!(pose.is_none());
    }
}
