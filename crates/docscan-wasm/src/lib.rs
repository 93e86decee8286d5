//! WASM bindings для сканера документов
//!
//! Предоставляет JavaScript API: кадры превью и снимки приходят как RGBA
//! из canvas, результат отдаётся как `ImageData`.

use docscan_core::{DocumentScanner, EnhanceOptions, PageCode, Point, Rect, ScannedDocument, ScannerConfig};
use image::{DynamicImage, RgbImage};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::Clamped;

/// Инициализация panic hook и логирования
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
    log::info!("Document scanner WASM module initialized");
}

/// Результат обработки превью для JavaScript
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewResult {
    document_detected: bool,
    capture: bool,
    qr_text: Option<String>,
    page: Option<PageCode>,
    preview_points: Option<[Point; 4]>,
    document_area: Option<Rect>,
}

/// Отсканированная страница
#[wasm_bindgen]
pub struct ScanOutput {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    document_found: bool,
    corners: Option<[Point; 4]>,
}

#[wasm_bindgen]
impl ScanOutput {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[wasm_bindgen(getter, js_name = documentFound)]
    pub fn document_found(&self) -> bool {
        self.document_found
    }

    /// Пиксели RGBA построчно
    #[wasm_bindgen(getter)]
    pub fn data(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.rgba.as_slice())
    }

    /// Углы документа в координатах превью или null
    #[wasm_bindgen(getter)]
    pub fn corners(&self) -> Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.corners).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Результат для `ctx.putImageData()`
    #[wasm_bindgen(js_name = toImageData)]
    pub fn to_image_data(&self) -> Result<web_sys::ImageData, JsValue> {
        web_sys::ImageData::new_with_u8_clamped_array_and_sh(Clamped(self.rgba.as_slice()), self.width, self.height)
    }
}

impl From<ScannedDocument> for ScanOutput {
    fn from(doc: ScannedDocument) -> Self {
        let rgba = match doc.processed {
            DynamicImage::ImageRgba8(img) => img,
            other => other.to_rgba8(),
        };

        Self {
            width: rgba.width(),
            height: rgba.height(),
            document_found: doc.quadrilateral.is_some(),
            corners: doc.preview_points,
            rgba: rgba.into_raw(),
        }
    }
}

/// JavaScript-доступный сканер документов
#[wasm_bindgen]
pub struct WasmDocumentScanner {
    scanner: DocumentScanner,
    options: EnhanceOptions,
}

#[wasm_bindgen]
impl WasmDocumentScanner {
    /// Создание нового сканера с настройками по умолчанию
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            scanner: DocumentScanner::new(),
            options: EnhanceOptions::default(),
        }
    }

    /// Создание сканера из JSON-настроек
    ///
    /// @param config - JSON, поля как у `ScannerConfig`; отсутствующие берутся по умолчанию
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config: &str) -> Result<WasmDocumentScanner, JsError> {
        let config = ScannerConfig::from_json(config).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self {
            scanner: DocumentScanner::with_config(config),
            options: EnhanceOptions::default(),
        })
    }

    /// Текущие настройки в JSON
    #[wasm_bindgen(js_name = configJson)]
    pub fn config_json(&self) -> Result<String, JsError> {
        self.scanner
            .config()
            .to_json()
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setColorMode)]
    pub fn set_color_mode(&mut self, enabled: bool) {
        self.options.color_mode = enabled;
    }

    #[wasm_bindgen(js_name = setFilterMode)]
    pub fn set_filter_mode(&mut self, enabled: bool) {
        self.options.filter_mode = enabled;
    }

    #[wasm_bindgen(js_name = setBugRotate)]
    pub fn set_bug_rotate(&mut self, enabled: bool) {
        self.scanner.set_bug_rotate(enabled);
    }

    /// Обработка кадра превью
    ///
    /// @param data - Uint8ClampedArray из canvas.getImageData()
    /// @param width - Ширина кадра
    /// @param height - Высота кадра
    /// @param autoMode - Съёмка по QR-коду страницы
    /// @param previewOnly - Только подсказка, без съёмки
    /// @returns Object { documentDetected, capture, qrText, page, previewPoints, documentArea }
    #[wasm_bindgen(js_name = processPreview)]
    pub fn process_preview(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        auto_mode: bool,
        preview_only: bool,
    ) -> Result<JsValue, JsError> {
        let image = rgba_to_rgb(data, width, height)?;
        let frame = docscan_core::PreviewFrame::new(image, auto_mode, preview_only);
        let outcome = self.scanner.process_preview(&frame);

        let result = PreviewResult {
            document_detected: outcome.detection.document_detected(),
            capture: outcome.decision.capture,
            qr_text: outcome.decision.qr_text,
            page: outcome.decision.page,
            preview_points: outcome.detection.preview_points,
            document_area: outcome.detection.document_area,
        };

        serde_wasm_bindgen::to_value(&result).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Обработка полноразмерного снимка из canvas
    #[wasm_bindgen(js_name = processPicture)]
    pub fn process_picture(&mut self, data: &[u8], width: u32, height: u32) -> Result<ScanOutput, JsError> {
        let image = rgba_to_rgb(data, width, height)?;
        Ok(self.scanner.process_picture(image, self.options).into())
    }

    /// Обработка снимка из байтов (PNG, JPEG)
    #[wasm_bindgen(js_name = scanImage)]
    pub fn scan_image(&mut self, image_data: &[u8]) -> Result<ScanOutput, JsError> {
        self.scanner
            .scan_bytes(image_data, self.options)
            .map(ScanOutput::from)
            .map_err(|e| JsError::new(&e.to_string()))
    }
}

impl Default for WasmDocumentScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Конвертация RGBA из canvas в RGB
fn rgba_to_rgb(rgba: &[u8], width: u32, height: u32) -> Result<RgbImage, JsError> {
    let pixel_count = width as usize * height as usize;
    if pixel_count == 0 {
        return Err(JsError::new("Image has no pixels"));
    }
    if rgba.len() < pixel_count * 4 {
        return Err(JsError::new("Pixel data is shorter than width * height * 4"));
    }

    let rgb: Vec<u8> = rgba[..pixel_count * 4]
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    RgbImage::from_raw(width, height, rgb).ok_or_else(|| JsError::new("Failed to create image from data"))
}

/// Информация о версии
#[wasm_bindgen(js_name = version)]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
