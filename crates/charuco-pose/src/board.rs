//! Board specification and layout helpers for ChArUco.

use crate::dictionary::DictionarySpec;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Static ChArUco board specification.
///
/// `squares_x`/`squares_y` are **square counts** (not inner corner counts).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub squares_x: u32,
    pub squares_y: u32,
    /// Side of one chessboard square, meters.
    pub square_size_m: f64,
    /// Side of one marker, meters.
    pub marker_size_m: f64,
    pub dictionary: DictionarySpec,
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("squares_x and squares_y must be >= 2 (got {squares_x} x {squares_y})")]
    InvalidSize { squares_x: u32, squares_y: u32 },
    #[error("square_size_m must be finite and > 0 (got {0})")]
    InvalidSquareSize(f64),
    #[error("marker_size_m must be in (0, square_size_m) (got {marker} for square {square})")]
    InvalidMarkerSize { marker: f64, square: f64 },
    #[error("dictionary id {0} is not a known predefined dictionary")]
    UnknownDictionary(i32),
    #[error("dictionary has no markers or zero bits per side")]
    EmptyDictionary,
    #[error("board needs {needed} markers, dictionary has {available}")]
    NotEnoughDictionaryCodes { needed: usize, available: usize },
}

/// Validated board with precomputed marker placement.
///
/// Follows the pre-4.6 OpenCV ChArUco layout. Board frame: origin at the
/// bottom-left outer corner, x right, y up, z out of the board. The
/// bottom-left square is black and markers occupy the white squares. Marker
/// ids run row-major from the top row; corner ids run row-major from the
/// bottom row.
///
/// Cell coordinates `[i, j]` count squares from the bottom-left, so `j` grows
/// upwards.
#[derive(Clone, Debug)]
pub struct CharucoBoard {
    spec: BoardSpec,
    marker_cells: Vec<[u32; 2]>,
    /// Marker ids touching each inner corner, indexed by corner id.
    corner_markers: Vec<Vec<u32>>,
}

impl CharucoBoard {
    /// Validate and create a board from a spec.
    pub fn new(spec: BoardSpec) -> Result<Self, BoardError> {
        if spec.squares_x < 2 || spec.squares_y < 2 {
            return Err(BoardError::InvalidSize {
                squares_x: spec.squares_x,
                squares_y: spec.squares_y,
            });
        }
        if !spec.square_size_m.is_finite() || spec.square_size_m <= 0.0 {
            return Err(BoardError::InvalidSquareSize(spec.square_size_m));
        }
        if !spec.marker_size_m.is_finite()
            || spec.marker_size_m <= 0.0
            || spec.marker_size_m >= spec.square_size_m
        {
            return Err(BoardError::InvalidMarkerSize {
                marker: spec.marker_size_m,
                square: spec.square_size_m,
            });
        }
        if spec.dictionary.marker_count() == 0 || spec.dictionary.bits_per_side() == 0 {
            return Err(BoardError::EmptyDictionary);
        }

        let marker_cells = white_square_cells(spec.squares_x, spec.squares_y);
        let needed = marker_cells.len();
        let available = spec.dictionary.marker_count() as usize;
        if available < needed {
            return Err(BoardError::NotEnoughDictionaryCodes { needed, available });
        }

        let corner_markers = corner_marker_adjacency(spec.squares_x, spec.squares_y, &marker_cells);

        Ok(Self {
            spec,
            marker_cells,
            corner_markers,
        })
    }

    /// Return the underlying board specification.
    #[inline]
    pub fn spec(&self) -> &BoardSpec {
        &self.spec
    }

    /// Number of markers on the board.
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.marker_cells.len()
    }

    /// Number of inner chessboard corners.
    #[inline]
    pub fn corner_count(&self) -> usize {
        ((self.spec.squares_x - 1) * (self.spec.squares_y - 1)) as usize
    }

    /// Cell coordinates `[i, j]` (j counted from the bottom) of a marker.
    pub fn marker_cell(&self, marker_id: i32) -> Option<[u32; 2]> {
        let idx = usize::try_from(marker_id).ok()?;
        self.marker_cells.get(idx).copied()
    }

    /// Board-plane corners of a marker (TL, TR, BR, BL as printed), meters.
    pub fn marker_object_corners(&self, marker_id: i32) -> Option<[Point2<f64>; 4]> {
        let [i, j] = self.marker_cell(marker_id)?;
        let s = self.spec.square_size_m;
        let m = self.spec.marker_size_m;
        let left = i as f64 * s + 0.5 * (s - m);
        let top = j as f64 * s + 0.5 * (s - m) + m;
        Some([
            Point2::new(left, top),
            Point2::new(left + m, top),
            Point2::new(left + m, top - m),
            Point2::new(left, top - m),
        ])
    }

    /// Corner id of the intersection `(ix, iy)`, `iy` counted from the bottom.
    pub fn corner_id(&self, ix: u32, iy: u32) -> Option<u32> {
        let (sx, sy) = (self.spec.squares_x, self.spec.squares_y);
        if ix == 0 || iy == 0 || ix >= sx || iy >= sy {
            return None;
        }
        Some((iy - 1) * (sx - 1) + (ix - 1))
    }

    /// Board-plane position of an inner corner, meters.
    pub fn corner_object_xy(&self, corner_id: u32) -> Option<Point2<f64>> {
        if corner_id as usize >= self.corner_count() {
            return None;
        }
        let inner_cols = self.spec.squares_x - 1;
        let i = (corner_id % inner_cols) as f64 + 1.0;
        let j = (corner_id / inner_cols) as f64 + 1.0;
        Some(Point2::new(
            i * self.spec.square_size_m,
            j * self.spec.square_size_m,
        ))
    }

    /// Markers whose squares touch the given inner corner.
    pub fn adjacent_markers(&self, corner_id: u32) -> &[u32] {
        self.corner_markers
            .get(corner_id as usize)
            .map_or(&[], Vec::as_slice)
    }

    /// Axis length used for visualization: half of the shorter board side.
    pub fn axis_length_m(&self) -> f64 {
        0.5 * self.spec.squares_x.min(self.spec.squares_y) as f64 * self.spec.square_size_m
    }
}

fn white_square_cells(squares_x: u32, squares_y: u32) -> Vec<[u32; 2]> {
    let mut out = Vec::new();
    for j in (0..squares_y).rev() {
        for i in 0..squares_x {
            // Bottom-left square is black, so white squares have (i + j) odd.
            if (i + j) % 2 == 1 {
                out.push([i, j]);
            }
        }
    }
    out
}

fn corner_marker_adjacency(squares_x: u32, squares_y: u32, cells: &[[u32; 2]]) -> Vec<Vec<u32>> {
    let mut by_cell = vec![None; (squares_x * squares_y) as usize];
    for (id, &[i, j]) in cells.iter().enumerate() {
        by_cell[(j * squares_x + i) as usize] = Some(id as u32);
    }

    let mut out = Vec::with_capacity(((squares_x - 1) * (squares_y - 1)) as usize);
    for iy in 1..squares_y {
        for ix in 1..squares_x {
            let touching = [
                [ix - 1, iy - 1],
                [ix, iy - 1],
                [ix - 1, iy],
                [ix, iy],
            ];
            let ids = touching
                .iter()
                .filter_map(|&[i, j]| by_cell[(j * squares_x + i) as usize])
                .collect();
            out.push(ids);
        }
    }
    out
}
