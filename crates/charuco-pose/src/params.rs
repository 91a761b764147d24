//! Detector, refinement and interpolation parameters.

use serde::{Deserialize, Serialize};

/// Sub-pixel refinement applied to marker corners by the marker detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerRefinementMethod {
    #[default]
    None,
    Subpix,
    Contour,
    Apriltag,
}

impl CornerRefinementMethod {
    /// Map the integer code used by the common ArUco parameter set.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Subpix),
            2 => Some(Self::Contour),
            3 => Some(Self::Apriltag),
            _ => None,
        }
    }
}

/// Thresholds forwarded to the marker detector.
///
/// Values are not validated here; the detector implementation rejects what it
/// cannot handle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub adaptive_thresh_win_size_min: i32,
    pub adaptive_thresh_win_size_max: i32,
    pub adaptive_thresh_win_size_step: i32,
    /// Constant subtracted from the local mean during adaptive thresholding.
    pub adaptive_thresh_constant: f64,
    /// Candidate perimeter bounds, relative to the largest image side.
    pub min_marker_perimeter_rate: f64,
    pub max_marker_perimeter_rate: f64,
    pub polygonal_approx_accuracy_rate: f64,
    pub min_corner_distance_rate: f64,
    /// Pixels.
    pub min_distance_to_border: i32,
    pub min_marker_distance_rate: f64,
    pub corner_refinement_method: CornerRefinementMethod,
    pub corner_refinement_win_size: i32,
    pub corner_refinement_max_iterations: i32,
    pub corner_refinement_min_accuracy: f64,
    pub marker_border_bits: i32,
    pub perspective_remove_pixel_per_cell: i32,
    pub perspective_remove_ignored_margin_per_cell: f64,
    pub max_erroneous_bits_in_border_rate: f64,
    pub min_otsu_std_dev: f64,
    pub error_correction_rate: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            adaptive_thresh_win_size_min: 3,
            adaptive_thresh_win_size_max: 23,
            adaptive_thresh_win_size_step: 10,
            adaptive_thresh_constant: 7.0,
            min_marker_perimeter_rate: 0.03,
            max_marker_perimeter_rate: 4.0,
            polygonal_approx_accuracy_rate: 0.03,
            min_corner_distance_rate: 0.05,
            min_distance_to_border: 3,
            min_marker_distance_rate: 0.05,
            corner_refinement_method: CornerRefinementMethod::None,
            corner_refinement_win_size: 5,
            corner_refinement_max_iterations: 30,
            corner_refinement_min_accuracy: 0.1,
            marker_border_bits: 1,
            perspective_remove_pixel_per_cell: 4,
            perspective_remove_ignored_margin_per_cell: 0.13,
            max_erroneous_bits_in_border_rate: 0.35,
            min_otsu_std_dev: 5.0,
            error_correction_rate: 0.6,
        }
    }
}

/// Recovery of markers missed by the first detection pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Maximum mean corner distance (pixels) between a projected marker and a
    /// rejected candidate for the candidate to be adopted.
    pub min_rep_distance: f64,
    /// Try all four corner orderings of each candidate.
    pub check_all_orders: bool,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            min_rep_distance: 10.0,
            check_all_orders: true,
        }
    }
}

/// Board corner interpolation and sub-pixel refinement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationParams {
    /// Detected markers that must touch a corner for it to be reported.
    pub min_markers: usize,
    /// Half-size of the refinement window; `0` derives it from the local
    /// square size in pixels.
    pub subpix_half_window: usize,
    pub subpix_max_iterations: usize,
    /// Stop once the update moves the corner less than this many pixels.
    pub subpix_epsilon: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            min_markers: 2,
            subpix_half_window: 0,
            subpix_max_iterations: 100,
            subpix_epsilon: 0.01,
        }
    }
}
