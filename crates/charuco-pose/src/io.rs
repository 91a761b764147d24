//! JSON configuration for a ChArUco pose node.

use crate::backend::{MarkerDetector, NativeBackend};
use crate::board::{BoardError, BoardSpec, CharucoBoard};
use crate::dictionary::DictionarySpec;
use crate::orchestrator::DEFAULT_TF_FRAME;
use crate::params::{DetectorParams, InterpolationParams, RefineParams};
use crate::pipeline::CharucoPipeline;
use charuco_pose_core::PoseSolveParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Physical board as configured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub squares_x: u32,
    pub squares_y: u32,
    pub square_size_m: f64,
    pub marker_size_m: f64,
    /// Catalog id; `<= 0` generates a custom dictionary from the two fields below.
    pub dictionary_id: i32,
    pub marker_count: u32,
    pub bits_per_side: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            squares_x: 10,
            squares_y: 14,
            square_size_m: 0.0280,
            marker_size_m: 0.0168,
            dictionary_id: 10,
            marker_count: 70,
            bits_per_side: 6,
        }
    }
}

impl BoardConfig {
    pub fn to_spec(&self) -> Result<BoardSpec, BoardError> {
        let dictionary =
            DictionarySpec::from_config(self.dictionary_id, self.marker_count, self.bits_per_side)
                .ok_or(BoardError::UnknownDictionary(self.dictionary_id))?;
        Ok(BoardSpec {
            squares_x: self.squares_x,
            squares_y: self.squares_y,
            square_size_m: self.square_size_m,
            marker_size_m: self.marker_size_m,
            dictionary,
        })
    }
}

/// Stream addressing and output frame naming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub charuco_tf_frame: String,
    pub image_topic: String,
    pub camera_info_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose_topic: Option<String>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            charuco_tf_frame: DEFAULT_TF_FRAME.to_string(),
            image_topic: "image_raw".to_string(),
            camera_info_topic: "camera_info".to_string(),
            detection_topic: None,
            pose_topic: None,
        }
    }
}

impl FrameConfig {
    /// Visualization topic, `<image_topic>_charuco_detection` unless set.
    pub fn detection_topic(&self) -> String {
        self.detection_topic
            .clone()
            .unwrap_or_else(|| format!("{}_charuco_detection", self.image_topic))
    }

    /// Pose topic, `<image_topic>_charuco_pose` unless set.
    pub fn pose_topic(&self) -> String {
        self.pose_topic
            .clone()
            .unwrap_or_else(|| format!("{}_charuco_pose", self.image_topic))
    }
}

/// Full node configuration. Every field has a default, so partial documents load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharucoNodeConfig {
    pub detector: DetectorParams,
    pub board: BoardConfig,
    pub refine: RefineParams,
    pub interpolation: InterpolationParams,
    pub pose: PoseSolveParams,
    pub frames: FrameConfig,
}

impl CharucoNodeConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Build a validated board from the config.
    pub fn build_board(&self) -> Result<CharucoBoard, ConfigError> {
        Ok(CharucoBoard::new(self.board.to_spec()?)?)
    }

    /// Backend around `detector` using the configured refinement settings.
    pub fn build_backend<D: MarkerDetector>(&self, detector: D) -> NativeBackend<D> {
        NativeBackend::with_params(
            detector,
            self.refine.clone(),
            self.interpolation.clone(),
            self.pose.clone(),
        )
    }

    /// Build a pipeline around `detector`.
    pub fn build_pipeline<D: MarkerDetector>(
        &self,
        detector: D,
    ) -> Result<CharucoPipeline<NativeBackend<D>>, ConfigError> {
        let board = self.build_board()?;
        Ok(CharucoPipeline::new(
            board,
            self.detector.clone(),
            self.build_backend(detector),
        ))
    }
}
