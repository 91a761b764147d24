//! Detection overlay rendering.

use crate::backend::{BoardCorners, MarkerDetections, Quad};
use crate::board::CharucoBoard;
use charuco_pose_core::{BoardPose, CameraIntrinsics, GrayImageView};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use nalgebra::{Point2, Point3};

pub const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const MARKER_FIRST_CORNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const REJECTED_COLOR: Rgb<u8> = Rgb([255, 0, 100]);
pub const CORNER_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const AXIS_COLORS: [Rgb<u8>; 3] = [Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255])];

/// Gray input replicated into three channels.
pub fn gray_to_canvas(image: &GrayImageView<'_>) -> RgbImage {
    RgbImage::from_fn(image.width as u32, image.height as u32, |x, y| {
        let v = image.data[y as usize * image.width + x as usize];
        Rgb([v, v, v])
    })
}

/// Markers drawn around a point reach this far from it, pixels.
const MARK_RADIUS: f64 = 4.0;

/// Clip `a -> b` to the canvas (Liang-Barsky).
///
/// `draw_line_segment_mut` walks the whole unclipped span, so a far-off end
/// point would cost one step per pixel of it.
fn clip_segment(
    canvas: &RgbImage,
    a: Point2<f64>,
    b: Point2<f64>,
) -> Option<((f32, f32), (f32, f32))> {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    let d = b - a;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-d.x, a.x + 1.0),
        (d.x, w - a.x),
        (-d.y, a.y + 1.0),
        (d.y, h - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    let start = a + d * t0;
    let end = a + d * t1;
    Some(((start.x as f32, start.y as f32), (end.x as f32, end.y as f32)))
}

fn draw_segment(canvas: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, color: Rgb<u8>) {
    if let Some((start, end)) = clip_segment(canvas, a, b) {
        draw_line_segment_mut(canvas, start, end, color);
    }
}

/// Integer pixel of `p` if a mark around it can touch the canvas.
fn mark_center(canvas: &RgbImage, p: Point2<f64>) -> Option<(i32, i32)> {
    let on_canvas = p.x > -MARK_RADIUS
        && p.y > -MARK_RADIUS
        && p.x < canvas.width() as f64 + MARK_RADIUS
        && p.y < canvas.height() as f64 + MARK_RADIUS;
    on_canvas.then(|| (p.x.round() as i32, p.y.round() as i32))
}

fn draw_quad(canvas: &mut RgbImage, quad: &Quad, color: Rgb<u8>) {
    for k in 0..4 {
        draw_segment(canvas, quad[k], quad[(k + 1) % 4], color);
    }
}

/// Accepted markers in green with their first corner boxed in red.
pub fn draw_markers(canvas: &mut RgbImage, detections: &MarkerDetections) {
    for quad in &detections.corners {
        draw_quad(canvas, quad, MARKER_COLOR);
        if let Some((x, y)) = mark_center(canvas, quad[0]) {
            draw_hollow_rect_mut(canvas, Rect::at(x - 3, y - 3).of_size(7, 7), MARKER_FIRST_CORNER_COLOR);
        }
    }
}

pub fn draw_rejected(canvas: &mut RgbImage, rejected: &[Quad]) {
    for quad in rejected {
        draw_quad(canvas, quad, REJECTED_COLOR);
    }
}

pub fn draw_board_corners(canvas: &mut RgbImage, corners: &BoardCorners) {
    for p in &corners.corners {
        if let Some(center) = mark_center(canvas, *p) {
            draw_hollow_circle_mut(canvas, center, 3, CORNER_COLOR);
        }
    }
}

/// Board frame axes (x red, y green, z blue) projected with the estimated pose.
///
/// Returns `false` if an axis end point does not project.
pub fn draw_axes(
    canvas: &mut RgbImage,
    board: &CharucoBoard,
    camera: &CameraIntrinsics,
    pose: &BoardPose,
) -> bool {
    let len = board.axis_length_m();
    let points = [
        Point3::origin(),
        Point3::new(len, 0.0, 0.0),
        Point3::new(0.0, len, 0.0),
        Point3::new(0.0, 0.0, len),
    ];
    let mut projected = [Point2::origin(); 4];
    for (dst, p) in projected.iter_mut().zip(&points) {
        match camera.project(&pose.transform_point(p)) {
            Some(px) => *dst = px,
            None => return false,
        }
    }
    for (axis, color) in AXIS_COLORS.iter().enumerate() {
        draw_segment(canvas, projected[0], projected[axis + 1], *color);
    }
    true
}
