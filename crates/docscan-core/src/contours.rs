//! Модуль извлечения контуров
//!
//! Кадр уменьшается до высоты 500 пикселей, переводится в оттенки серого,
//! размывается и проходит через детектор границ Canny. Все найденные контуры
//! сортируются по убыванию площади: самые крупные кандидаты проверяются
//! первыми.

use image::{imageops, GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::filter::separable_filter_equal;
use imageproc::geometry::contour_area;
use imageproc::point::Point as PixelPoint;

use crate::config::DetectionConfig;
use crate::geometry::{detection_ratio, detection_size};

/// Контур в координатах кадра детекции
#[derive(Debug, Clone)]
pub struct Contour {
    /// Точки границы в порядке обхода
    pub points: Vec<PixelPoint<i32>>,
    /// Площадь, охватываемая контуром
    pub area: f64,
}

impl Contour {
    pub fn new(points: Vec<PixelPoint<i32>>) -> Self {
        let area = contour_area(&points);
        Self { points, area }
    }
}

/// Результат одного прохода извлечения
#[derive(Debug, Clone)]
pub struct DetectionFrame {
    /// source height / detection height
    pub ratio: f64,
    /// Размер кадра детекции (ширина, высота)
    pub size: (u32, u32),
    /// Контуры, отсортированные по убыванию площади
    pub contours: Vec<Contour>,
}

impl DetectionFrame {
    fn empty() -> Self {
        Self {
            ratio: 0.0,
            size: (0, 0),
            contours: Vec::new(),
        }
    }
}

/// Извлекатель контуров
pub struct ContourExtractor {
    config: DetectionConfig,
}

impl Default for ContourExtractor {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

impl ContourExtractor {
    /// Создание извлекателя с конфигурацией
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Полный проход: уменьшение, серый, размытие, границы, контуры
    pub fn extract(&self, img: &RgbImage) -> DetectionFrame {
        let (width, height) = img.dimensions();
        let (det_width, det_height) = detection_size(width, height);
        if det_width == 0 || det_height == 0 {
            log::debug!("Skipping contour extraction for {}x{} image", width, height);
            return DetectionFrame::empty();
        }

        let edges = self.edge_map(img, det_width, det_height);

        let mut contours: Vec<Contour> = find_contours::<i32>(&edges)
            .into_iter()
            .filter(|c| c.points.len() >= 3)
            .map(|c| Contour::new(c.points))
            .collect();

        // Stable: equal areas keep tracing order
        contours.sort_by(|a, b| b.area.total_cmp(&a.area));

        log::debug!(
            "Extracted {} contours from {}x{} detection frame",
            contours.len(),
            det_width,
            det_height
        );

        DetectionFrame {
            ratio: detection_ratio(height),
            size: (det_width, det_height),
            contours,
        }
    }

    /// Карта границ кадра детекции
    pub fn edge_map(&self, img: &RgbImage, det_width: u32, det_height: u32) -> GrayImage {
        let resized = self.resize(img, det_width, det_height);
        let gray = imageops::grayscale(&resized);
        let blurred = gaussian_blur_5(&gray, self.config.blur_sigma);
        canny(&blurred, self.config.canny_low, self.config.canny_high)
    }

    /// Ресайз изображения до размера кадра детекции
    fn resize(&self, img: &RgbImage, det_width: u32, det_height: u32) -> RgbImage {
        if img.dimensions() == (det_width, det_height) {
            return img.clone();
        }

        imageops::resize(img, det_width, det_height, imageops::FilterType::Triangle)
    }
}

/// Normalised 5-tap Gaussian kernel
pub fn blur_kernel(sigma: f32) -> [f32; 5] {
    let mut kernel = [0.0f32; 5];
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - 2.0;
        *k = (-(x * x) / (2.0 * sigma * sigma)).exp();
    }

    let total: f32 = kernel.iter().sum();
    kernel.map(|k| k / total)
}

/// 5x5 Gaussian blur with edge replication.
///
/// Filtering runs on 8.8 fixed-point samples so the result is rounded
/// rather than truncated back to `u8`.
pub fn gaussian_blur_5(gray: &GrayImage, sigma: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let wide: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([gray.get_pixel(x, y).0[0] as u16 * 256]));

    let blurred = separable_filter_equal(&wide, &blur_kernel(sigma));

    GrayImage::from_fn(width, height, |x, y| {
        let v = (blurred.get_pixel(x, y).0[0] as u32 + 128) / 256;
        Luma([v.min(255) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as PixelRect;

    #[test]
    fn test_blank_image_has_no_contours() {
        let extractor = ContourExtractor::default();
        let img = RgbImage::from_pixel(200, 100, Rgb([128, 128, 128]));
        let frame = extractor.extract(&img);
        assert!(frame.contours.is_empty());
        assert_eq!(frame.size, (1000, 500));
        assert!((frame.ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_image() {
        let extractor = ContourExtractor::default();
        let frame = extractor.extract(&RgbImage::new(0, 0));
        assert!(frame.contours.is_empty());
        assert_eq!(frame.size, (0, 0));
    }

    #[test]
    fn test_contours_sorted_by_area() {
        let mut img = RgbImage::from_pixel(500, 500, Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut img, PixelRect::at(50, 50).of_size(300, 300), Rgb([240, 240, 240]));
        draw_filled_rect_mut(&mut img, PixelRect::at(400, 400).of_size(60, 60), Rgb([240, 240, 240]));

        let frame = ContourExtractor::default().extract(&img);
        assert!(frame.contours.len() >= 2);
        for pair in frame.contours.windows(2) {
            assert!(pair[0].area >= pair[1].area);
        }
        // The big sheet dominates
        assert!(frame.contours[0].area > 250.0 * 250.0);
    }

    #[test]
    fn test_blur_kernel_is_normalised() {
        let kernel = blur_kernel(1.1);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(kernel[0], kernel[4]);
        assert_eq!(kernel[1], kernel[3]);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
    }

    #[test]
    fn test_blur_keeps_flat_field() {
        let flat = GrayImage::from_pixel(20, 20, Luma([255]));
        assert_eq!(gaussian_blur_5(&flat, 1.1), flat);

        let mid = GrayImage::from_pixel(7, 5, Luma([128]));
        assert_eq!(gaussian_blur_5(&mid, 1.1), mid);
    }

    #[test]
    fn test_blur_spreads_five_taps() {
        let mut img = GrayImage::new(11, 11);
        img.put_pixel(5, 5, Luma([255]));
        let blurred = gaussian_blur_5(&img, 1.1);

        assert!(blurred.get_pixel(5, 5).0[0] > 0);
        assert!(blurred.get_pixel(7, 5).0[0] > 0);
        assert!(blurred.get_pixel(7, 7).0[0] > 0);
        // Outside the 5x5 support nothing changes
        assert_eq!(blurred.get_pixel(8, 5).0[0], 0);
        assert_eq!(blurred.get_pixel(5, 2).0[0], 0);
    }

    #[test]
    fn test_contour_area() {
        let c = Contour::new(vec![
            PixelPoint::new(0, 0),
            PixelPoint::new(10, 0),
            PixelPoint::new(10, 5),
            PixelPoint::new(0, 5),
        ]);
        assert_eq!(c.area, 50.0);

        // Orientation does not matter
        let mut reversed = c.points.clone();
        reversed.reverse();
        assert_eq!(Contour::new(reversed).area, 50.0);

        let line = Contour::new(vec![PixelPoint::new(0, 0), PixelPoint::new(3, 3)]);
        assert_eq!(line.area, 0.0);
    }
}
