//! Camera intrinsics store.

use charuco_pose_core::{CameraIntrinsics, FrameHeader, DISTORTION_COEFFS};
use serde::{Deserialize, Serialize};
use parking_lot::RwLock;
use std::sync::Arc;

/// Calibration message as received from the camera driver.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub header: FrameHeader,
    pub width: u32,
    pub height: u32,
    /// Intrinsic matrix, row-major.
    pub k: [f64; 9],
    /// Distortion coefficients `[k1, k2, p1, p2, k3, ...]`.
    pub d: Vec<f64>,
}

impl CameraInfo {
    /// Distortion vector fitted to five coefficients (zero-padded or truncated).
    pub fn distortion5(&self) -> [f64; DISTORTION_COEFFS] {
        let mut out = [0.0; DISTORTION_COEFFS];
        for (dst, src) in out.iter_mut().zip(&self.d) {
            *dst = *src;
        }
        out
    }
}

/// Latest accepted camera intrinsics, shared between the calibration and
/// image handlers.
///
/// Replacement swaps a whole snapshot, so readers never see a partially
/// updated matrix.
#[derive(Debug, Default)]
pub struct IntrinsicsStore {
    current: RwLock<Option<Arc<CameraIntrinsics>>>,
}

impl IntrinsicsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `info` iff its intrinsic matrix has a non-zero entry.
    ///
    /// A rejected update leaves the stored snapshot untouched.
    pub fn update(&self, info: &CameraInfo) -> bool {
        if !CameraIntrinsics::has_nonzero_matrix(&info.k) {
            log::warn!(
                "camera info from '{}' has an all-zero intrinsic matrix, ignoring",
                info.header.frame_id
            );
            return false;
        }
        if info.d.len() != DISTORTION_COEFFS {
            log::debug!(
                "distortion vector has {} coefficients, using the first {}",
                info.d.len(),
                DISTORTION_COEFFS
            );
        }
        let snapshot = Arc::new(CameraIntrinsics::from_row_major(
            &info.k,
            info.distortion5(),
            info.header.clone(),
        ));
        *self.current.write() = Some(snapshot);
        true
    }

    /// Snapshot of the latest accepted intrinsics.
    pub fn current(&self) -> Option<Arc<CameraIntrinsics>> {
        self.current.read().clone()
    }

    pub fn is_calibrated(&self) -> bool {
        self.current().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(k: [f64; 9], d: Vec<f64>) -> CameraInfo {
        CameraInfo {
            header: FrameHeader::new(7, "camera"),
            width: 640,
            height: 480,
            k,
            d,
        }
    }

    #[test]
    fn zero_matrix_is_rejected_and_keeps_prior_state() {
        let store = IntrinsicsStore::new();
        assert!(!store.update(&info([0.0; 9], vec![0.0; 5])));
        assert!(store.current().is_none());

        let k = [600.0, 0.0, 320.0, 0.0, 600.0, 240.0, 0.0, 0.0, 1.0];
        assert!(store.update(&info(k, vec![0.1, 0.0, 0.0, 0.0, 0.0])));
        assert!(!store.update(&info([0.0; 9], vec![])));
        let snapshot = store.current().expect("calibrated");
        assert_eq!(snapshot.row_major(), k);
        assert_eq!(snapshot.distortion[0], 0.1);
    }

    #[test]
    fn any_nonzero_entry_is_accepted() {
        let store = IntrinsicsStore::new();
        let mut k = [0.0; 9];
        k[2] = 1.0;
        assert!(store.update(&info(k, vec![])));
        assert_eq!(store.current().expect("calibrated").row_major(), k);
    }

    #[test]
    fn distortion_is_padded_or_truncated() {
        let short = info([1.0; 9], vec![0.1, 0.2]);
        assert_eq!(short.distortion5(), [0.1, 0.2, 0.0, 0.0, 0.0]);
        let long = info([1.0; 9], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(long.distortion5(), [1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn accepted_snapshot_keeps_provenance() {
        let store = IntrinsicsStore::new();
        store.update(&info([600.0, 0.0, 320.0, 0.0, 600.0, 240.0, 0.0, 0.0, 1.0], vec![0.0; 5]));
        let snapshot = store.current().expect("calibrated");
        assert_eq!(snapshot.provenance, FrameHeader::new(7, "camera"));
    }
}
