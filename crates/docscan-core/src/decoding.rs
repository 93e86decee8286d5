//! Модуль декодирования QR-кодов
//!
//! QR ищется только в углу превью-кадра, где на шаблоне страницы напечатан
//! код. Использует rqrr как основной декодер с fallback на rxing.

use image::{imageops, GrayImage, RgbImage};
use rxing::qrcode::QRCodeReader;
use rxing::{BarcodeFormat, DecodingHintDictionary, Reader};

use crate::geometry::Rect;

/// Декодер QR-кодов.
///
/// Returns every text it could decode; an image without codes yields an
/// empty list. Implementations log and drop malformed symbols.
pub trait QrDecoder: Send {
    fn decode_all(&self, img: &GrayImage) -> Vec<String>;
}

/// Decoder that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoQr;

impl QrDecoder for NoQr {
    fn decode_all(&self, _img: &GrayImage) -> Vec<String> {
        Vec::new()
    }
}

/// Область поиска QR в превью-кадре.
///
/// Bottom-left corner when the sensor is mounted upside down, top-right
/// otherwise. Returns `None` when the frame is too narrow for the region.
pub fn qr_region(width: u32, height: u32, bug_rotate: bool) -> Option<Rect> {
    let (w, h) = (width as i32, height as i32);

    let rect = if bug_rotate {
        Rect::new(0, h - h / 4, w / 2 - h / 4, h)
    } else {
        Rect::new(w / 2 + h / 4, 0, w, h / 4)
    };

    if rect.is_empty() || rect.left < 0 || rect.top < 0 || rect.right > w || rect.bottom > h {
        None
    } else {
        Some(rect)
    }
}

/// Вырезка области QR в оттенках серого
pub fn crop_region(frame: &RgbImage, region: &Rect) -> GrayImage {
    let view = imageops::crop_imm(
        frame,
        region.left as u32,
        region.top as u32,
        region.width() as u32,
        region.height() as u32,
    );
    imageops::grayscale(&view.to_image())
}

/// Декодер QR-кодов с fallback
pub struct QrReader {
    /// Попробовать rxing, если rqrr ничего не нашёл
    try_rxing: bool,
}

impl Default for QrReader {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder for QrReader {
    fn decode_all(&self, img: &GrayImage) -> Vec<String> {
        let texts = self.decode_with_rqrr(img);
        if !texts.is_empty() || !self.try_rxing {
            return texts;
        }

        self.decode_with_rxing(img).into_iter().collect()
    }
}

impl QrReader {
    /// Создание декодера
    pub fn new() -> Self {
        Self { try_rxing: true }
    }

    /// Декодирование всех сеток через rqrr
    fn decode_with_rqrr(&self, img: &GrayImage) -> Vec<String> {
        let mut prepared = rqrr::PreparedImage::prepare(img.clone());
        let grids = prepared.detect_grids();
        log::debug!("RQRR: Detected {} grids", grids.len());

        grids
            .iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_, content)) => Some(content),
                Err(e) => {
                    log::debug!("RQRR: Decode failed: {:?}", e);
                    None
                }
            })
            .collect()
    }

    /// Декодирование через rxing
    fn decode_with_rxing(&self, img: &GrayImage) -> Option<String> {
        let (width, height) = img.dimensions();

        // Формат: 0xAARRGGBB
        let pixels: Vec<u32> = img
            .as_raw()
            .iter()
            .map(|&gray| {
                let g = gray as u32;
                0xFF000000 | (g << 16) | (g << 8) | g
            })
            .collect();

        let luminance_source = rxing::RGBLuminanceSource::new_with_width_height_pixels(
            width as usize,
            height as usize,
            &pixels,
        );
        let mut bitmap = rxing::BinaryBitmap::new(rxing::common::HybridBinarizer::new(luminance_source));

        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            rxing::DecodeHintType::POSSIBLE_FORMATS,
            rxing::DecodeHintValue::PossibleFormats(std::collections::HashSet::from([
                BarcodeFormat::QR_CODE,
            ])),
        );

        let mut reader = QRCodeReader::new();
        match reader.decode_with_hints(&mut bitmap, &hints) {
            Ok(result) => {
                log::debug!("RXING: Decode success");
                Some(result.getText().to_string())
            }
            Err(e) => {
                log::debug!("RXING: Not found: {}", e);
                None
            }
        }
    }
}
