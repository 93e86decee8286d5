//! Geometry primitives shared by detection and rectification.
//!
//! Coordinates are `f64` image-space values. Rectangles use integer pixel
//! bounds `[left, top, right, bottom]`, matching the way hot and document
//! areas are derived from frame sizes.

use image::{Rgb, RgbImage};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Height of the detection frame in pixels.
pub const DETECTION_HEIGHT: f64 = 500.0;

const COLLINEAR_EPSILON: f64 = 1e-6;
const SAMPLE_EPSILON: f64 = 1e-6;

/// Errors raised when a quadrilateral cannot be turned into a transform
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Degenerate quadrilateral: corners are collinear or the transform is singular")]
    Degenerate,

    #[error("Rectified output would be empty ({width}x{height})")]
    EmptyOutput { width: u32, height: u32 },
}

/// Точка в координатах изображения
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn scale(&self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

impl From<imageproc::point::Point<i32>> for Point {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Point::new(p.x as f64, p.y as f64)
    }
}

/// Прямоугольник [left, top, right, bottom] в пикселях
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Ratio between a source height and the detection frame height.
pub fn detection_ratio(source_height: u32) -> f64 {
    source_height as f64 / DETECTION_HEIGHT
}

/// Size of the detection frame for a source of the given size.
///
/// Both sides are divided by the ratio and truncated, so the height is
/// always `DETECTION_HEIGHT` and the aspect ratio is preserved.
pub fn detection_size(width: u32, height: u32) -> (u32, u32) {
    let ratio = detection_ratio(height);
    if ratio <= 0.0 {
        return (0, 0);
    }
    ((width as f64 / ratio) as u32, (height as f64 / ratio) as u32)
}

/// Order four points as [top-left, top-right, bottom-right, bottom-left].
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right
/// has the smallest `y - x`, bottom-left the largest. On exact ties the
/// point with the lowest index wins.
pub fn order_corners(points: &[Point; 4]) -> [Point; 4] {
    let sum = |p: &Point| p.x + p.y;
    let diff = |p: &Point| p.y - p.x;

    let mut tl = 0;
    let mut br = 0;
    let mut tr = 0;
    let mut bl = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        if sum(p) < sum(&points[tl]) {
            tl = i;
        }
        if sum(p) > sum(&points[br]) {
            br = i;
        }
        if diff(p) < diff(&points[tr]) {
            tr = i;
        }
        if diff(p) > diff(&points[bl]) {
            bl = i;
        }
    }

    [points[tl], points[tr], points[br], points[bl]]
}

/// True when the ordered quad fully encloses the rectangle.
pub fn encloses(corners: &[Point; 4], area: &Rect) -> bool {
    let [tl, tr, br, bl] = corners;
    let (x0, y0, x1, y1) = (
        area.left as f64,
        area.top as f64,
        area.right as f64,
        area.bottom as f64,
    );

    tl.x <= x0
        && tl.y <= y0
        && tr.x >= x1
        && tr.y <= y0
        && br.x >= x1
        && br.y >= y1
        && bl.x <= x0
        && bl.y >= y1
}

/// True when any three of the four points lie on one line.
pub fn has_collinear_triple(points: &[Point; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];

    TRIPLES.iter().any(|&(a, b, c)| {
        let (p, q, r) = (points[a], points[b], points[c]);
        let cross = (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
        cross.abs() < COLLINEAR_EPSILON
    })
}

/// Compute the homography mapping `src` points onto `dst` points.
///
/// Solves the exact 8x8 system for four correspondences with `h33 = 1`.
/// Returns `Degenerate` for collinear input or a singular system.
pub fn find_homography(src: &[Point; 4], dst: &[Point; 4]) -> Result<Matrix3<f64>, GeometryError> {
    if has_collinear_triple(src) || has_collinear_triple(dst) {
        return Err(GeometryError::Degenerate);
    }

    let mut a = DMatrix::<f64>::zeros(8, 8);
    let mut b = DVector::<f64>::zeros(8);

    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (u, v) = (dst[i].x, dst[i].y);

        a[(i * 2, 0)] = x;
        a[(i * 2, 1)] = y;
        a[(i * 2, 2)] = 1.0;
        a[(i * 2, 6)] = -x * u;
        a[(i * 2, 7)] = -y * u;
        b[i * 2] = u;

        a[(i * 2 + 1, 3)] = x;
        a[(i * 2 + 1, 4)] = y;
        a[(i * 2 + 1, 5)] = 1.0;
        a[(i * 2 + 1, 6)] = -x * v;
        a[(i * 2 + 1, 7)] = -y * v;
        b[i * 2 + 1] = v;
    }

    let h = a.lu().solve(&b).ok_or(GeometryError::Degenerate)?;
    if h.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::Degenerate);
    }

    #[rustfmt::skip]
    let matrix = Matrix3::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], 1.0,
    );
    Ok(matrix)
}

/// Map a point through a homography.
pub fn project(matrix: &Matrix3<f64>, p: &Point) -> Option<Point> {
    let v = matrix * Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() < 1e-12 {
        return None;
    }
    Some(Point::new(v.x / v.z, v.y / v.z))
}

/// Apply perspective warp to a color image.
///
/// `matrix` maps source coordinates to output coordinates; every output
/// pixel is sampled from the source through its inverse. Pixels that map
/// outside the source are black.
pub fn warp_perspective(
    img: &RgbImage,
    matrix: &Matrix3<f64>,
    out_width: u32,
    out_height: u32,
) -> Result<RgbImage, GeometryError> {
    let inv_matrix = matrix.try_inverse().ok_or(GeometryError::Degenerate)?;
    let mut output = RgbImage::new(out_width, out_height);

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        // Map output pixel (x, y) back to the source image
        let src_h = inv_matrix * Vector3::new(x as f64, y as f64, 1.0);
        let z = src_h.z;
        if z.abs() < 1e-12 {
            continue;
        }

        *pixel = bilinear_sample(img, src_h.x / z, src_h.y / z);
    }

    Ok(output)
}

fn bilinear_sample(img: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let width = img.width() as f64;
    let height = img.height() as f64;

    if x < -SAMPLE_EPSILON
        || y < -SAMPLE_EPSILON
        || x > width - 1.0 + SAMPLE_EPSILON
        || y > height - 1.0 + SAMPLE_EPSILON
    {
        return Rgb([0, 0, 0]);
    }
    let x = x.clamp(0.0, width - 1.0);
    let y = y.clamp(0.0, height - 1.0);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);

    let dx = x - x0 as f64;
    let dy = y - y0 as f64;

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - dx) + p10[c] as f64 * dx;
        let bottom = p01[c] as f64 * (1.0 - dx) + p11[c] as f64 * dx;
        out[c] = (top * (1.0 - dy) + bottom * dy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
