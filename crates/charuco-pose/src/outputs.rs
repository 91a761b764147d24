//! Messages emitted per frame and the sinks that receive them.

use charuco_pose_core::{FrameHeader, Pose};
use image::RgbImage;
use nalgebra::{UnitQuaternion, Vector3};
use std::sync::Arc;

/// Board pose in the camera frame, stamped with the source image header.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseStamped {
    pub header: FrameHeader,
    pub pose: Pose,
}

/// Camera-to-board transform; `header.frame_id` is the parent (camera) frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformStamped {
    pub header: FrameHeader,
    pub child_frame_id: String,
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl TransformStamped {
    pub fn from_pose(pose: &PoseStamped, child_frame_id: impl Into<String>) -> Self {
        Self {
            header: pose.header.clone(),
            child_frame_id: child_frame_id.into(),
            translation: pose.pose.position,
            rotation: pose.pose.orientation,
        }
    }
}

/// Annotated detection canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct StampedImage {
    pub header: FrameHeader,
    pub image: RgbImage,
}

pub trait PoseSink {
    fn publish_pose(&self, pose: &PoseStamped);
}

pub trait TransformSink {
    fn publish_transform(&self, transform: &TransformStamped);
}

pub trait VisualizationSink {
    fn publish_visualization(&self, image: &StampedImage);
}

impl<S: PoseSink + ?Sized> PoseSink for Arc<S> {
    fn publish_pose(&self, pose: &PoseStamped) {
        (**self).publish_pose(pose)
    }
}

impl<S: TransformSink + ?Sized> TransformSink for Arc<S> {
    fn publish_transform(&self, transform: &TransformStamped) {
        (**self).publish_transform(transform)
    }
}

impl<S: VisualizationSink + ?Sized> VisualizationSink for Arc<S> {
    fn publish_visualization(&self, image: &StampedImage) {
        (**self).publish_visualization(image)
    }
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl PoseSink for NullSink {
    fn publish_pose(&self, _pose: &PoseStamped) {}
}

impl TransformSink for NullSink {
    fn publish_transform(&self, _transform: &TransformStamped) {}
}

impl VisualizationSink for NullSink {
    fn publish_visualization(&self, _image: &StampedImage) {}
}
