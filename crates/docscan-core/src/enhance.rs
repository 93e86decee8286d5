//! Модуль улучшения документа
//!
//! Режимы:
//! - ч/б: оттенки серого, опционально адаптивная бинаризация
//! - цвет + фильтр: контраст, маска по адаптивному порогу, белый фон и
//!   цветовой фильтр насыщенности
//! - цвет без фильтра: без изменений

use image::{imageops, DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::config::{EnhanceConfig, EnhanceOptions};

/// Полярность адаптивной бинаризации
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Светлее локального порога → 255
    Binary,
    /// Светлее локального порога → 0
    BinaryInv,
}

/// Улучшение документа
pub struct DocumentEnhancer {
    config: EnhanceConfig,
}

impl Default for DocumentEnhancer {
    fn default() -> Self {
        Self::new(EnhanceConfig::default())
    }
}

impl DocumentEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }

    /// Apply the enhancement selected by `options`.
    ///
    /// Black-and-white modes return `ImageLuma8`, color modes `ImageRgb8`.
    pub fn enhance(&self, src: RgbImage, options: EnhanceOptions) -> DynamicImage {
        match (options.color_mode, options.filter_mode) {
            (false, filter) => {
                let gray = imageops::grayscale(&src);
                if filter {
                    DynamicImage::ImageLuma8(adaptive_threshold(
                        &gray,
                        self.config.block_size,
                        self.config.threshold_offset,
                        Polarity::Binary,
                    ))
                } else {
                    DynamicImage::ImageLuma8(gray)
                }
            }
            (true, true) => DynamicImage::ImageRgb8(self.enhance_color(src)),
            (true, false) => DynamicImage::ImageRgb8(src),
        }
    }

    /// Цветной режим с фильтром
    fn enhance_color(&self, src: RgbImage) -> RgbImage {
        let gained = apply_gain(&src, self.config.color_gain, self.config.color_bias);

        let mask = adaptive_threshold(
            &imageops::grayscale(&gained),
            self.config.block_size,
            self.config.threshold_offset,
            Polarity::BinaryInv,
        );

        // Foreground keeps its gained color, background goes white
        let mut result = RgbImage::from_pixel(gained.width(), gained.height(), Rgb([255, 255, 255]));
        for ((out, pixel), m) in result.pixels_mut().zip(gained.pixels()).zip(mask.pixels()) {
            if m.0[0] != 0 {
                *out = *pixel;
            }
        }

        color_threshold(&mut result, self.config.color_threshold);
        result
    }
}

/// Линейная коррекция `v * gain + bias` с насыщением
pub fn apply_gain(src: &RgbImage, gain: f64, bias: f64) -> RgbImage {
    let mut out = src.clone();
    for pixel in out.pixels_mut() {
        for c in pixel.0.iter_mut() {
            *c = (*c as f64 * gain + bias).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Адаптивная бинаризация по локальному среднему.
///
/// The mean is taken over a full `block_size`-wide square window; taps
/// outside the image repeat the nearest edge pixel. The mean is rounded to
/// an integer. With `Polarity::Binary` a pixel becomes 255 when it is
/// brighter than `mean - offset`.
pub fn adaptive_threshold(img: &GrayImage, block_size: u32, offset: i32, polarity: Polarity) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    let radius = (block_size / 2) as usize;
    let side = (2 * radius + 1) as u64;
    let area = side * side;
    let sums = box_sums_replicate(img, radius);

    let (fg, bg) = match polarity {
        Polarity::Binary => (255u8, 0u8),
        Polarity::BinaryInv => (0u8, 255u8),
    };

    for ((out, pixel), sum) in output.pixels_mut().zip(img.pixels()).zip(sums) {
        let mean = ((sum + area / 2) / area) as i32;
        let value = pixel.0[0] as i32;
        *out = Luma([if value > mean - offset { fg } else { bg }]);
    }

    output
}

/// Row-major window sums with edge replication, rows first then columns
fn box_sums_replicate(img: &GrayImage, radius: usize) -> Vec<u64> {
    let (width, height) = (img.width() as usize, img.height() as usize);

    let mut rows = vec![0u64; width * height];
    let mut line = vec![0u64; width];
    for (y, row) in img.as_raw().chunks_exact(width).enumerate() {
        for (dst, &v) in line.iter_mut().zip(row) {
            *dst = v as u64;
        }
        window_sums(&line, radius, &mut rows[y * width..(y + 1) * width]);
    }

    let mut sums = vec![0u64; width * height];
    let mut column = vec![0u64; height];
    let mut column_sums = vec![0u64; height];
    for x in 0..width {
        for (y, dst) in column.iter_mut().enumerate() {
            *dst = rows[y * width + x];
        }
        window_sums(&column, radius, &mut column_sums);
        for (y, &sum) in column_sums.iter().enumerate() {
            sums[y * width + x] = sum;
        }
    }

    sums
}

/// Sum over `[i - radius, i + radius]` for every `i`; out-of-range taps
/// take the first or last value.
fn window_sums(values: &[u64], radius: usize, out: &mut [u64]) {
    let n = values.len();
    let mut prefix = vec![0u64; n + 1];
    for (i, &v) in values.iter().enumerate() {
        prefix[i + 1] = prefix[i] + v;
    }

    for (i, dst) in out.iter_mut().enumerate() {
        let first = i.saturating_sub(radius);
        let last = (i + radius).min(n - 1);
        let before = radius.saturating_sub(i) as u64;
        let after = (i + radius).saturating_sub(n - 1) as u64;

        *dst = prefix[last + 1] - prefix[first] + before * values[0] + after * values[n - 1];
    }
}

/// Цветовой фильтр насыщенности.
///
/// A pixel with its brightest channel above `threshold` and a channel mean
/// below 80% of that maximum is rescaled so the brightest channel reaches
/// 255, keeping the ratio between channels. Pure white pixels (all three
/// channels at 255) are kept. Every other pixel becomes black.
pub fn color_threshold(img: &mut RgbImage, threshold: u8) {
    for pixel in img.pixels_mut() {
        *pixel = clamp_pixel(*pixel, threshold);
    }
}

/// Фильтр для одного пикселя
pub fn clamp_pixel(pixel: Rgb<u8>, threshold: u8) -> Rgb<u8> {
    let [r, g, b] = pixel.0;
    if r == 255 && g == 255 && b == 255 {
        return pixel;
    }

    let max = r.max(g).max(b) as f64;
    let mean = (r as f64 + g as f64 + b as f64) / 3.0;

    if max > threshold as f64 && mean < max * 0.8 {
        let scale = |c: u8| (c as f64 * 255.0 / max).round().min(255.0) as u8;
        Rgb([scale(r), scale(g), scale(b)])
    } else {
        Rgb([0, 0, 0])
    }
}
