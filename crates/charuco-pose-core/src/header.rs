use serde::{Deserialize, Serialize};

/// Provenance of a frame or calibration message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Acquisition timestamp in nanoseconds.
    pub stamp_ns: u64,
    /// Coordinate frame of the sensor that produced the data.
    pub frame_id: String,
}

impl FrameHeader {
    pub fn new(stamp_ns: u64, frame_id: impl Into<String>) -> Self {
        Self {
            stamp_ns,
            frame_id: frame_id.into(),
        }
    }
}
