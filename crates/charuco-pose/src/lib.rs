//! ChArUco board detection and pose estimation for camera streams.
//!
//! Layers, bottom up:
//! - board geometry and dictionary selection ([`CharucoBoard`]),
//! - the [`FiducialBackend`] boundary and its [`NativeBackend`]
//!   implementation over a pluggable [`MarkerDetector`],
//! - the per-frame [`CharucoPipeline`],
//! - the [`FrameOrchestrator`], which gates frames on the
//!   [`IntrinsicsStore`] and feeds the output sinks.
//!
//! Geometry (homographies, camera model, planar pose solve) lives in
//! `charuco-pose-core`.

pub mod backend;
mod board;
mod dictionary;
pub mod draw;
mod frame;
mod io;
mod latch;
mod orchestrator;
mod outputs;
mod params;
mod pipeline;
mod store;

pub use backend::{
    BackendError, BoardCorners, FiducialBackend, MarkerDetections, MarkerDetector, NativeBackend,
    Quad,
};
pub use board::{BoardError, BoardSpec, CharucoBoard};
pub use dictionary::{DictionarySpec, PredefinedDictionary};
pub use frame::{Encoding, FrameError, ImageFrame};
pub use io::{BoardConfig, CharucoNodeConfig, ConfigError, FrameConfig, IoError};
pub use latch::Latched;
pub use orchestrator::{
    CalibrationOutcome, FrameOrchestrator, FrameOutcome, Notice, NoticeCounters, Sinks,
    DEFAULT_TF_FRAME,
};
pub use outputs::{
    NullSink, PoseSink, PoseStamped, StampedImage, TransformSink, TransformStamped,
    VisualizationSink,
};
pub use params::{CornerRefinementMethod, DetectorParams, InterpolationParams, RefineParams};
pub use pipeline::{CharucoPipeline, DetectionResult, PipelineError};
pub use store::{CameraInfo, IntrinsicsStore};

pub use charuco_pose_core::{
    encode_pose, BoardPose, CameraIntrinsics, FrameHeader, GrayImage, GrayImageView, Pose,
};
