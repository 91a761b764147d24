#![allow(dead_code)]

use charuco_pose::{
    BackendError, BoardPose, BoardSpec, CameraInfo, CameraIntrinsics, CharucoBoard, DetectorParams,
    DictionarySpec, FrameHeader, GrayImage, GrayImageView, MarkerDetections, MarkerDetector,
    PredefinedDictionary, Quad,
};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector2, Vector3};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const WIDTH: usize = 640;
pub const HEIGHT: usize = 480;
pub const K: [f64; 9] = [800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn board() -> CharucoBoard {
    CharucoBoard::new(BoardSpec {
        squares_x: 5,
        squares_y: 7,
        square_size_m: 0.04,
        marker_size_m: 0.03,
        dictionary: DictionarySpec::Predefined(PredefinedDictionary::Dict4x4_50),
    })
    .expect("board")
}

pub fn camera(distortion: [f64; 5]) -> CameraIntrinsics {
    CameraIntrinsics::from_row_major(&K, distortion, FrameHeader::new(0, "camera"))
}

pub fn camera_info(k: [f64; 9], d: Vec<f64>) -> CameraInfo {
    CameraInfo {
        header: FrameHeader::new(1, "camera"),
        width: WIDTH as u32,
        height: HEIGHT as u32,
        k,
        d,
    }
}

pub fn truth() -> BoardPose {
    BoardPose::new(
        Vector3::new(0.12, -0.1, 0.03),
        Vector3::new(-0.1, -0.14, 0.8),
    )
}

/// Frame in which the synthetic detector sees the board.
pub fn lit_image() -> GrayImage {
    GrayImage::new(WIDTH, HEIGHT, 128)
}

/// Frame in which the synthetic detector sees nothing.
pub fn dark_image() -> GrayImage {
    GrayImage::new(WIDTH, HEIGHT, 0)
}

/// Anti-aliased image of the board squares seen through the undistorted
/// camera at `pose`, translated by `shift` pixels. Marker ink is left out so
/// corner neighborhoods hold only the checker pattern.
pub fn rendered_board(pose: &BoardPose, shift: Vector2<f64>) -> GrayImage {
    const SAMPLES: usize = 4;
    let spec = *board().spec();
    let s = spec.square_size_m;
    let (board_w, board_h) = (spec.squares_x as f64 * s, spec.squares_y as f64 * s);

    let r = Rotation3::new(pose.rotation);
    let rm = r.matrix();
    let plane = Matrix3::from_columns(&[
        rm.column(0).into_owned(),
        rm.column(1).into_owned(),
        pose.translation,
    ]);
    let to_board = (Matrix3::from_row_slice(&K) * plane)
        .try_inverse()
        .expect("board plane homography");

    let mut img = GrayImage::new(WIDTH, HEIGHT, 128);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let mut acc = 0.0;
            for sy in 0..SAMPLES {
                for sx in 0..SAMPLES {
                    let u = x as f64 - 0.5 + (sx as f64 + 0.5) / SAMPLES as f64 - shift.x;
                    let v = y as f64 - 0.5 + (sy as f64 + 0.5) / SAMPLES as f64 - shift.y;
                    let p = to_board * Vector3::new(u, v, 1.0);
                    let (bx, by) = (p.x / p.z, p.y / p.z);
                    acc += if bx < 0.0 || by < 0.0 || bx >= board_w || by >= board_h {
                        128.0
                    } else if ((bx / s).floor() as u32 + (by / s).floor() as u32) % 2 == 1 {
                        230.0
                    } else {
                        20.0
                    };
                }
            }
            img.data[y * WIDTH + x] = (acc / (SAMPLES * SAMPLES) as f64).round() as u8;
        }
    }
    img
}

pub fn project(camera: &CameraIntrinsics, pose: &BoardPose, p: Point2<f64>) -> Point2<f64> {
    camera
        .project(&pose.transform_point(&Point3::new(p.x, p.y, 0.0)))
        .expect("in front of camera")
}

/// Detector that reports the board markers as seen through a known camera
/// and pose. Frames with a mean intensity below 64 contain no board.
pub struct SyntheticDetector {
    pub board: CharucoBoard,
    pub camera: CameraIntrinsics,
    pub pose: BoardPose,
    /// Marker ids left out of the detections.
    pub hidden: Vec<i32>,
    /// Report hidden markers as rejected candidates (corner order rotated).
    pub hidden_as_rejected: bool,
    pub fail: AtomicBool,
    /// Panic instead of returning, as a crashing native detector would.
    pub panic: AtomicBool,
    pub calls: AtomicUsize,
}

impl SyntheticDetector {
    pub fn new(distortion: [f64; 5]) -> Self {
        Self {
            board: board(),
            camera: camera(distortion),
            pose: truth(),
            hidden: Vec::new(),
            hidden_as_rejected: false,
            fail: AtomicBool::new(false),
            panic: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_panicking(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }

    pub fn marker_quad(&self, id: i32) -> Quad {
        let obj = self.board.marker_object_corners(id).expect("marker on board");
        std::array::from_fn(|k| project(&self.camera, &self.pose, obj[k]))
    }
}

impl MarkerDetector for SyntheticDetector {
    fn detect(
        &self,
        image: &GrayImageView<'_>,
        _dictionary: &DictionarySpec,
        _params: &DetectorParams,
    ) -> Result<MarkerDetections, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic.load(Ordering::SeqCst) {
            panic!("synthetic detector crashed");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Detection("synthetic failure".to_string()));
        }

        let mean = image.data.iter().map(|&v| v as u64).sum::<u64>() / image.data.len() as u64;
        let mut out = MarkerDetections::default();
        if mean < 64 {
            return Ok(out);
        }

        for id in 0..self.board.marker_count() as i32 {
            let quad = self.marker_quad(id);
            if !quad.iter().all(|p| image.contains(p.x, p.y)) {
                continue;
            }
            if self.hidden.contains(&id) {
                if self.hidden_as_rejected {
                    out.rejected.push([quad[1], quad[2], quad[3], quad[0]]);
                }
                continue;
            }
            out.ids.push(id);
            out.corners.push(quad);
        }
        Ok(out)
    }
}
