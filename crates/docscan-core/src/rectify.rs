//! Perspective rectification of a detected document.
//!
//! Corners arrive at detection scale and are mapped back to the source
//! resolution with the detection ratio before the warp.

use image::RgbImage;

use crate::detection::Quadrilateral;
use crate::geometry::{find_homography, warp_perspective, GeometryError, Point};

/// Output size for a quad at detection scale.
///
/// Edge lengths are measured in detection space and multiplied by `ratio`
/// once, then rounded.
pub fn rectified_size(corners: &[Point; 4], ratio: f64) -> (u32, u32) {
    let [tl, tr, br, bl] = corners;

    let width_bottom = br.distance(bl);
    let width_top = tr.distance(tl);
    let height_right = tr.distance(br);
    let height_left = tl.distance(bl);

    let max_width = (width_bottom.max(width_top) * ratio).round();
    let max_height = (height_right.max(height_left) * ratio).round();

    (max_width.max(0.0) as u32, max_height.max(0.0) as u32)
}

/// Выпрямление перспективы документа
#[derive(Debug, Default, Clone)]
pub struct PerspectiveRectifier;

impl PerspectiveRectifier {
    pub fn new() -> Self {
        Self
    }

    /// Warp the quad (detection-scale corners) into an upright image.
    pub fn rectify(
        &self,
        src: &RgbImage,
        corners: &[Point; 4],
        ratio: f64,
    ) -> Result<RgbImage, GeometryError> {
        let (width, height) = rectified_size(corners, ratio);
        if width == 0 || height == 0 {
            return Err(GeometryError::EmptyOutput { width, height });
        }

        let source = corners.map(|p| p.scale(ratio));
        let (w, h) = (width as f64, height as f64);
        let target = [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ];

        let matrix = find_homography(&source, &target)?;
        log::debug!(
            "Rectifying {}x{} source to {}x{}",
            src.width(),
            src.height(),
            width,
            height
        );
        warp_perspective(src, &matrix, width, height)
    }

    /// Rectify when a quad is present; otherwise copy the source.
    ///
    /// Degenerate geometry is treated as "no document" and also falls back
    /// to a copy. The returned flag tells whether rectification happened.
    pub fn rectify_or_copy(
        &self,
        src: &RgbImage,
        quad: Option<&Quadrilateral>,
        ratio: f64,
    ) -> (RgbImage, bool) {
        let Some(quad) = quad else {
            return (src.clone(), false);
        };

        match self.rectify(src, quad.corners(), ratio) {
            Ok(doc) => (doc, true),
            Err(e) => {
                log::warn!("Rectification skipped: {}", e);
                (src.clone(), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 90])
        })
    }

    #[test]
    fn test_rectified_size_scales_once() {
        let corners = [
            Point::new(10.0, 10.0),
            Point::new(110.0, 10.0),
            Point::new(110.0, 60.0),
            Point::new(10.0, 60.0),
        ];
        assert_eq!(rectified_size(&corners, 2.0), (200, 100));
        assert_eq!(rectified_size(&corners, 1.5), (150, 75));
    }

    #[test]
    fn test_scale_consistency() {
        let det = [
            Point::new(12.3, 7.1),
            Point::new(140.7, 15.9),
            Point::new(133.2, 190.4),
            Point::new(4.4, 170.0),
        ];
        let ratio = 2.16;
        let at_source = det.map(|p| p.scale(ratio));

        let (w1, h1) = rectified_size(&det, ratio);
        let (w2, h2) = rectified_size(&at_source, 1.0);
        assert!((w1 as i64 - w2 as i64).abs() <= 1);
        assert!((h1 as i64 - h2 as i64).abs() <= 1);
    }

    #[test]
    fn test_axis_aligned_round_trip() {
        let src = gradient(64, 48);
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(64.0, 0.0),
            Point::new(64.0, 48.0),
            Point::new(0.0, 48.0),
        ];
        let out = PerspectiveRectifier::new().rectify(&src, &corners, 1.0).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
        for (x, y, p) in src.enumerate_pixels() {
            let q = out.get_pixel(x, y);
            for c in 0..3 {
                assert!((p.0[c] as i32 - q.0[c] as i32).abs() <= 1, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_degenerate_quad_falls_back() {
        let src = gradient(32, 32);
        let line = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(30.0, 30.0),
        ];
        let rectifier = PerspectiveRectifier::new();
        assert!(rectifier.rectify(&src, &line, 1.0).is_err());

        let quad = Quadrilateral::new(line, Vec::new());
        let (out, rectified) = rectifier.rectify_or_copy(&src, Some(&quad), 1.0);
        assert!(!rectified);
        assert_eq!(out, src);
    }

    #[test]
    fn test_no_quad_copies_source() {
        let src = gradient(16, 16);
        let (out, rectified) = PerspectiveRectifier::new().rectify_or_copy(&src, None, 1.0);
        assert!(!rectified);
        assert_eq!(out, src);
    }
}
