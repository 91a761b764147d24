//! Event handling for one camera stream.
//!
//! Calibration events go to the [`IntrinsicsStore`]; image events run the
//! pipeline once intrinsics are known and publish pose, transform and overlay
//! when a pose was found. Per-frame failures are logged and reported as a
//! [`FrameOutcome`], never propagated.

use crate::backend::FiducialBackend;
use crate::frame::{FrameError, ImageFrame};
use crate::outputs::{
    PoseSink, PoseStamped, StampedImage, TransformSink, TransformStamped, VisualizationSink,
};
use crate::pipeline::{CharucoPipeline, PipelineError};
use crate::store::{CameraInfo, IntrinsicsStore};
use charuco_pose_core::{encode_pose, CameraIntrinsics, GrayImageView, ImageError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Default child frame of the published transform.
pub const DEFAULT_TF_FRAME: &str = "charuco";

/// Non-fatal conditions raised while handling events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Image arrived before any valid calibration.
    UncalibratedInput,
    /// Calibration with an all-zero intrinsic matrix.
    InvalidCalibration,
    /// Conversion, detection or pose estimation failed for one frame.
    DetectionFailure(String),
}

#[derive(thiserror::Error, Debug)]
enum FrameFailure {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not processed.
    Dropped(Notice),
    /// Processed; no pose, nothing emitted.
    NoPose,
    /// Pose, transform and overlay emitted.
    Published,
    /// Processing failed; nothing emitted.
    Skipped(Notice),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalibrationOutcome {
    Accepted,
    Rejected(Notice),
}

/// Running totals of notices raised by an orchestrator.
#[derive(Debug, Default)]
pub struct NoticeCounters {
    uncalibrated: AtomicU64,
    invalid_calibration: AtomicU64,
    detection_failures: AtomicU64,
}

impl NoticeCounters {
    fn record(&self, notice: &Notice) {
        let counter = match notice {
            Notice::UncalibratedInput => &self.uncalibrated,
            Notice::InvalidCalibration => &self.invalid_calibration,
            Notice::DetectionFailure(_) => &self.detection_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uncalibrated(&self) -> u64 {
        self.uncalibrated.load(Ordering::Relaxed)
    }

    pub fn invalid_calibration(&self) -> u64 {
        self.invalid_calibration.load(Ordering::Relaxed)
    }

    pub fn detection_failures(&self) -> u64 {
        self.detection_failures.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.uncalibrated() + self.invalid_calibration() + self.detection_failures()
    }
}

/// Output sinks of an orchestrator.
pub struct Sinks {
    pub pose: Box<dyn PoseSink + Send + Sync>,
    pub transform: Box<dyn TransformSink + Send + Sync>,
    pub visualization: Box<dyn VisualizationSink + Send + Sync>,
}

impl Sinks {
    pub fn new(
        pose: impl PoseSink + Send + Sync + 'static,
        transform: impl TransformSink + Send + Sync + 'static,
        visualization: impl VisualizationSink + Send + Sync + 'static,
    ) -> Self {
        Self {
            pose: Box::new(pose),
            transform: Box::new(transform),
            visualization: Box::new(visualization),
        }
    }
}

/// Reacts to calibration and image events of one camera.
///
/// Both handlers take `&self`, so calibration updates may arrive on another
/// thread while a frame is being processed.
pub struct FrameOrchestrator<B> {
    pipeline: CharucoPipeline<B>,
    store: Arc<IntrinsicsStore>,
    tf_frame: String,
    sinks: Sinks,
    notices: NoticeCounters,
}

impl<B: FiducialBackend> FrameOrchestrator<B> {
    pub fn new(
        pipeline: CharucoPipeline<B>,
        store: Arc<IntrinsicsStore>,
        tf_frame: impl Into<String>,
        sinks: Sinks,
    ) -> Self {
        Self {
            pipeline,
            store,
            tf_frame: tf_frame.into(),
            sinks,
            notices: NoticeCounters::default(),
        }
    }

    pub fn pipeline(&self) -> &CharucoPipeline<B> {
        &self.pipeline
    }

    pub fn store(&self) -> &Arc<IntrinsicsStore> {
        &self.store
    }

    pub fn tf_frame(&self) -> &str {
        &self.tf_frame
    }

    pub fn notices(&self) -> &NoticeCounters {
        &self.notices
    }

    fn raise(&self, notice: Notice) -> Notice {
        self.notices.record(&notice);
        notice
    }

    pub fn on_camera_info(&self, info: &CameraInfo) -> CalibrationOutcome {
        if self.store.update(info) {
            CalibrationOutcome::Accepted
        } else {
            CalibrationOutcome::Rejected(self.raise(Notice::InvalidCalibration))
        }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(stamp_ns = frame.header.stamp_ns))
    )]
    pub fn on_image(&self, frame: &ImageFrame) -> FrameOutcome {
        let Some(camera) = self.store.current() else {
            log::warn!("no camera calibration received yet, dropping frame");
            return FrameOutcome::Dropped(self.raise(Notice::UncalibratedInput));
        };

        // A panicking collaborator costs one frame, not the stream.
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| self.process(frame, &camera))) {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("detection panicked: {}", panic_message(payload.as_ref())),
        };
        log::warn!("skipping frame {}: {reason}", frame.header.stamp_ns);
        FrameOutcome::Skipped(self.raise(Notice::DetectionFailure(reason)))
    }

    fn process(
        &self,
        frame: &ImageFrame,
        camera: &CameraIntrinsics,
    ) -> Result<FrameOutcome, FrameFailure> {
        let gray = frame.to_grayscale()?;
        let view = GrayImageView::new(gray.width() as usize, gray.height() as usize, gray.as_raw())?;
        let result = self.pipeline.detect(&view, Some(camera), true)?;

        if !result.pose_valid {
            log::debug!(
                "frame {}: {} markers, {} corners, no pose",
                frame.header.stamp_ns,
                result.marker_ids.len(),
                result.interpolated_board_corners.len()
            );
            return Ok(FrameOutcome::NoPose);
        }

        let pose = PoseStamped {
            header: frame.header.clone(),
            pose: encode_pose(&result.rotation, &result.translation),
        };
        self.sinks.pose.publish_pose(&pose);
        self.sinks
            .transform
            .publish_transform(&TransformStamped::from_pose(&pose, self.tf_frame.clone()));
        if let Some(image) = result.visualization {
            self.sinks.visualization.publish_visualization(&StampedImage {
                header: frame.header.clone(),
                image,
            });
        }
        Ok(FrameOutcome::Published)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
